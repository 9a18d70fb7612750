use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{RpcCall, RpcRequest, ScriptPubKey};

/// `getblock` with verbosity 2 on the parent chain
pub type GetParentBlockCall = GetBlockCall<bitcoin::BlockHash, Block<ParentTx>>;

/// `getblock` with verbosity 1, only the header fields are decoded
pub type GetParentBlockInfoCall = GetBlockCall<bitcoin::BlockHash, BlockInfo>;

/// `getblock` with verbosity 2 on the sidechain
pub type GetSidechainBlockCall = GetBlockCall<elements::BlockHash, Block<SidechainTx>>;

#[derive(Debug)]
pub struct GetBlockCall<H, R> {
    pub blockhash: H,
    pub verbosity: u8,
    resp: PhantomData<R>,
}

impl<H> GetBlockCall<H, BlockInfo> {
    pub fn info(blockhash: H) -> Self {
        GetBlockCall {
            blockhash,
            verbosity: 1,
            resp: PhantomData,
        }
    }
}

impl<H, T> GetBlockCall<H, Block<T>> {
    pub fn full(blockhash: H) -> Self {
        GetBlockCall {
            blockhash,
            verbosity: 2,
            resp: PhantomData,
        }
    }
}

impl<H: Serialize, R: DeserializeOwned> RpcCall for GetBlockCall<H, R> {
    type Response = R;

    fn get_request(self) -> RpcRequest {
        RpcRequest {
            method: "getblock".to_owned(),
            params: serde_json::json!({
                "blockhash": self.blockhash,
                "verbosity": self.verbosity,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockInfo {
    pub height: u32,
    pub time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block<T> {
    pub height: u32,
    pub time: i64,
    pub tx: Vec<T>,
}

/// Decoded parent-chain transaction, also returned by verbose `getrawtransaction`
#[derive(Debug, Clone, Deserialize)]
pub struct ParentTx {
    pub txid: bitcoin::Txid,
    #[serde(default)]
    pub vin: Vec<ParentVin>,
    #[serde(default)]
    pub vout: Vec<ParentVout>,
    /// Only set by `getrawtransaction` for confirmed transactions
    pub blockhash: Option<bitcoin::BlockHash>,
}

/// Coinbase inputs have neither `txid` nor `vout`
#[derive(Debug, Clone, Deserialize)]
pub struct ParentVin {
    pub txid: Option<bitcoin::Txid>,
    pub vout: Option<u32>,
}

impl ParentVin {
    pub fn outpoint(&self) -> Option<bitcoin::OutPoint> {
        Some(bitcoin::OutPoint {
            txid: self.txid?,
            vout: self.vout?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentVout {
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: bitcoin::Amount,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SidechainTx {
    pub txid: elements::Txid,
    #[serde(default)]
    pub vin: Vec<SidechainVin>,
    #[serde(default)]
    pub vout: Vec<SidechainVout>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SidechainVin {
    #[serde(default)]
    pub is_pegin: bool,
    /// Parent-chain txid when `is_pegin` is set
    pub txid: Option<bitcoin::Txid>,
    pub vout: Option<u32>,
}

/// `value` and `asset` are missing for confidential outputs
#[derive(Debug, Clone, Deserialize)]
pub struct SidechainVout {
    #[serde(default, with = "bitcoin::amount::serde::as_btc::opt")]
    pub value: Option<bitcoin::Amount>,
    pub asset: Option<elements::AssetId>,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}
