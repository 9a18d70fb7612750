use bitcoin::{Amount, OutPoint, SignedAmount};
use serde::Serialize;

/// Peg-in or peg-out seen on the sidechain, never updated once stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PegEvent {
    pub sidechain_height: u32,
    pub sidechain_block_time: i64,
    /// Positive for peg-ins, negative for peg-outs
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: SignedAmount,
    pub sidechain_txid: elements::Txid,
    /// Input index for peg-ins, output index for peg-outs
    pub sidechain_index: u32,
    pub parent_address: String,
    /// Only known for peg-ins
    pub parent: Option<PegInSource>,
    pub is_final_tx: bool,
}

/// Parent-chain output consumed by a peg-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PegInSource {
    pub txid: bitcoin::Txid,
    pub vout: u32,
    pub block_height: u32,
    pub block_time: i64,
}

impl PegEvent {
    pub fn is_peg_in(&self) -> bool {
        self.amount.is_positive()
    }

    /// Federation UTXO created by a peg-in, due for its first audit at its own block height
    pub fn federation_utxo(&self) -> Option<FederationUtxo> {
        let parent = self.parent.as_ref()?;
        if !self.is_peg_in() {
            return None;
        }
        Some(FederationUtxo {
            txid: parent.txid,
            vout: parent.vout,
            address: self.parent_address.clone(),
            amount: self.amount.unsigned_abs(),
            created_block_height: parent.block_height,
            created_block_time: parent.block_time,
            is_unspent: true,
            last_verified_height: parent.block_height.saturating_sub(1),
            last_verified_time: 0,
        })
    }
}

/// Parent-chain output believed to be controlled by the federation.
/// Once `is_unspent` is false the row is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FederationUtxo {
    pub txid: bitcoin::Txid,
    pub vout: u32,
    pub address: String,
    pub amount: Amount,
    pub created_block_height: u32,
    pub created_block_time: i64,
    pub is_unspent: bool,
    pub last_verified_height: u32,
    pub last_verified_time: i64,
}

impl FederationUtxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No peg-in has seeded the federation UTXO set yet
    NoFederationUtxos,
    ParentNotSynced { blocks: u32, headers: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome<T> {
    /// Another invocation of the same pass is in progress
    AlreadyRunning,
    Skipped(SkipReason),
    Done(T),
}
