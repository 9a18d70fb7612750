use serde::{Deserialize, Serialize};

use super::{RpcCall, RpcRequest};

#[derive(Debug, Serialize)]
pub struct GetTxOutCall {
    pub txid: bitcoin::Txid,
    pub n: u32,
    pub include_mempool: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetTxOutValue {
    pub bestblock: bitcoin::BlockHash,
    pub confirmations: u32,
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: bitcoin::Amount,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: super::ScriptPubKey,
    #[serde(default)]
    pub coinbase: bool,
}

/// `null` when the output is spent or unknown
pub type GetTxOutCallResp = Option<GetTxOutValue>;

impl RpcCall for GetTxOutCall {
    type Response = GetTxOutCallResp;

    fn get_request(self) -> RpcRequest {
        RpcRequest {
            method: "gettxout".to_owned(),
            params: serde_json::to_value(&self).expect("must not fail"),
        }
    }
}
