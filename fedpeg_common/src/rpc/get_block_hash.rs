use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::{RpcCall, RpcRequest};

/// `H` is the block hash type of the queried chain
#[derive(Debug)]
pub struct GetBlockHashCall<H> {
    pub height: u32,
    hash: PhantomData<H>,
}

impl<H> GetBlockHashCall<H> {
    pub fn new(height: u32) -> Self {
        GetBlockHashCall {
            height,
            hash: PhantomData,
        }
    }
}

impl<H: DeserializeOwned> RpcCall for GetBlockHashCall<H> {
    type Response = H;

    fn get_request(self) -> RpcRequest {
        RpcRequest {
            method: "getblockhash".to_owned(),
            params: serde_json::json!({ "height": self.height }),
        }
    }
}
