use serde::Deserialize;

use super::{RpcCall, RpcRequest};

#[derive(Debug)]
pub struct GetBlockchainInfoCall;

#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u32,
    pub headers: u32,
}

impl BlockchainInfo {
    pub fn is_synced(&self) -> bool {
        self.blocks == self.headers
    }
}

impl RpcCall for GetBlockchainInfoCall {
    type Response = BlockchainInfo;

    fn get_request(self) -> RpcRequest {
        RpcRequest {
            method: "getblockchaininfo".to_owned(),
            params: serde_json::json!([]),
        }
    }
}
