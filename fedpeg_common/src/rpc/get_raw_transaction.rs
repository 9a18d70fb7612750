use super::{get_block::ParentTx, RpcCall, RpcRequest};

/// Verbose `getrawtransaction` on the parent chain
#[derive(Debug)]
pub struct GetRawTransactionCall {
    pub txid: bitcoin::Txid,
}

impl RpcCall for GetRawTransactionCall {
    type Response = ParentTx;

    fn get_request(self) -> RpcRequest {
        RpcRequest {
            method: "getrawtransaction".to_owned(),
            // Positional, the second argument was renamed from `verbose` to `verbosity`
            params: serde_json::json!([self.txid, true]),
        }
    }
}
