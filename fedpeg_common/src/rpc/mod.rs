use anyhow::Context;
use base64::Engine;
use serde::Deserialize;

pub mod get_block;
pub mod get_block_hash;
pub mod get_blockchain_info;
pub mod get_chain_tips;
pub mod get_raw_transaction;
pub mod get_tx_out;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcServer {
    pub url: String,
    pub login: String,
    pub password: String,
}

pub struct RpcRequest {
    pub method: String,
    pub params: serde_json::Value,
}

pub trait RpcCall {
    type Response: serde::de::DeserializeOwned;

    fn get_request(self) -> RpcRequest;
}

#[derive(Debug, Deserialize, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    error: Option<RpcError>,
}

/// `scriptPubKey` object as decoded by bitcoind and elementsd.
/// The `pegout_*` fields are only set by elementsd.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    #[serde(rename = "type", default)]
    pub script_type: String,
    pub address: Option<String>,
    // Pre-v22 nodes
    #[serde(default)]
    pub addresses: Vec<String>,
    pub pegout_chain: Option<String>,
    pub pegout_address: Option<String>,
    #[serde(default)]
    pub pegout_addresses: Vec<String>,
}

impl ScriptPubKey {
    pub const TYPE_NULL_DATA: &'static str = "nulldata";

    pub fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .or_else(|| self.addresses.first().map(String::as_str))
    }

    pub fn pegout_destination(&self) -> Option<&str> {
        self.pegout_addresses
            .first()
            .map(String::as_str)
            .or(self.pegout_address.as_deref())
    }

    pub fn is_null_data(&self) -> bool {
        self.script_type == Self::TYPE_NULL_DATA
    }
}

fn send_request(
    rpc_server: &RpcServer,
    request: RpcRequest,
) -> Result<serde_json::Value, anyhow::Error> {
    let auth = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", rpc_server.login, rpc_server.password));
    let body = ureq::json!({
        "jsonrpc": "1.0",
        "id": "fedpeg",
        "method": request.method,
        "params": request.params,
    });

    let response = match ureq::post(&rpc_server.url)
        .set("Authorization", &format!("Basic {auth}"))
        .send_json(body)
    {
        Ok(response) => response,
        // RPC errors come back with HTTP 500 and a JSON body
        Err(ureq::Error::Status(_code, response)) => response,
        Err(err) => anyhow::bail!("{} request failed: {err}", request.method),
    };

    let status = response.status();
    let body = response.into_string()?;
    let resp = serde_json::from_str::<RpcResponse>(&body)
        .with_context(|| format!("unexpected HTTP {status} response: {body}"))?;
    if let Some(error) = resp.error {
        return Err(error.into());
    }

    Ok(resp.result)
}

pub async fn make_rpc_call<T: RpcCall>(
    rpc_server: &RpcServer,
    call: T,
) -> Result<T::Response, anyhow::Error> {
    let request = call.get_request();
    let method = request.method.clone();
    let rpc_server = rpc_server.clone();

    let result =
        match tokio::task::spawn_blocking(move || send_request(&rpc_server, request)).await? {
            Ok(result) => result,
            Err(err) => {
                log::debug!("{method} failed: {err}");
                return Err(err);
            }
        };

    let resp = serde_json::from_value::<T::Response>(result)
        .with_context(|| format!("invalid {method} response"))?;

    Ok(resp)
}
