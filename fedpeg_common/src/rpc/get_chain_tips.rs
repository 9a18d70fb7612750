use serde::Deserialize;

use super::{RpcCall, RpcRequest};

#[derive(Debug)]
pub struct GetChainTipsCall;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainTip {
    pub height: u32,
    pub hash: String,
    pub status: String,
}

impl RpcCall for GetChainTipsCall {
    type Response = Vec<ChainTip>;

    fn get_request(self) -> RpcRequest {
        RpcRequest {
            method: "getchaintips".to_owned(),
            params: serde_json::json!([]),
        }
    }
}

/// Height of the `active` tip, or of the first reported one
pub fn active_tip_height(tips: &[ChainTip]) -> Option<u32> {
    tips.iter()
        .find(|tip| tip.status == "active")
        .or_else(|| tips.first())
        .map(|tip| tip.height)
}
