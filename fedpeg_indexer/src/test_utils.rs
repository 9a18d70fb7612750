use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use bitcoin::{hashes::Hash, Amount, OutPoint};
use fedpeg_common::rpc::{
    get_block::{
        Block, BlockInfo, ParentTx, ParentVin, ParentVout, SidechainTx, SidechainVin,
        SidechainVout,
    },
    get_blockchain_info::BlockchainInfo,
    get_tx_out::{GetTxOutCallResp, GetTxOutValue},
    ScriptPubKey,
};
use fedpeg_types::network::{asset_id, Network};

use crate::{
    chain::{ParentChain, Sidechain},
    db::Db,
};

pub const USDT_ASSET: elements::AssetId =
    asset_id("ce091c998b83c78bb71a632313ba3760f1763d9cfcffae02258ffa9865a37bd2");

pub const PEG_IN_ADDRESS_A: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
pub const PEG_IN_ADDRESS_B: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
pub const CHANGE_ADDRESS: &str = "bc1qxvay4an52gcghxq5lavact7r6qe9l4laedsazz8fj2ee2cy47tlqff4aj4";
pub const USER_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

/// 2024-01-15
pub const JAN_2024: i64 = 1_705_276_800;
/// 2024-02-15
pub const FEB_2024: i64 = 1_707_955_200;
/// 2024-03-15
pub const MAR_2024: i64 = 1_710_460_800;

fn hash_bytes(prefix: u8, n: u32) -> [u8; 32] {
    let mut data = [prefix; 32];
    data[..4].copy_from_slice(&n.to_le_bytes());
    data
}

fn hash_height(data: [u8; 32]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

pub fn parent_txid(n: u32) -> bitcoin::Txid {
    bitcoin::Txid::from_byte_array(hash_bytes(0xaa, n))
}

pub fn sidechain_txid(n: u32) -> elements::Txid {
    elements::Txid::from_byte_array(hash_bytes(0xbb, n))
}

pub fn parent_block_hash(height: u32) -> bitcoin::BlockHash {
    bitcoin::BlockHash::from_byte_array(hash_bytes(0x01, height))
}

pub fn sidechain_block_hash(height: u32) -> elements::BlockHash {
    elements::BlockHash::from_byte_array(hash_bytes(0x02, height))
}

pub fn address_script(address: &str) -> ScriptPubKey {
    ScriptPubKey {
        script_type: "witness_v0_keyhash".to_owned(),
        address: Some(address.to_owned()),
        ..Default::default()
    }
}

pub fn parent_tx(txid: bitcoin::Txid, inputs: &[OutPoint], outputs: &[(u64, &str)]) -> ParentTx {
    ParentTx {
        txid,
        vin: inputs
            .iter()
            .map(|outpoint| ParentVin {
                txid: Some(outpoint.txid),
                vout: Some(outpoint.vout),
            })
            .collect(),
        vout: outputs
            .iter()
            .enumerate()
            .map(|(n, (value, address))| ParentVout {
                value: Amount::from_sat(*value),
                n: n as u32,
                script_pub_key: address_script(address),
            })
            .collect(),
        blockhash: None,
    }
}

/// Sidechain tx claiming `parent` through its first input
pub fn peg_in_tx(txid: elements::Txid, parent: OutPoint) -> SidechainTx {
    SidechainTx {
        txid,
        vin: vec![SidechainVin {
            is_pegin: true,
            txid: Some(parent.txid),
            vout: Some(parent.vout),
        }],
        vout: Vec::new(),
    }
}

/// Sidechain tx with an ordinary input, an explicit peg-out as output 0 and a fee output
pub fn peg_out_tx(txid: elements::Txid, amount: u64, destination: &str) -> SidechainTx {
    let policy_asset = Network::Liquid.d().policy_asset;
    SidechainTx {
        txid,
        vin: vec![SidechainVin {
            is_pegin: false,
            txid: Some(parent_txid(0xffff)),
            vout: Some(0),
        }],
        vout: vec![
            SidechainVout {
                value: Some(Amount::from_sat(amount)),
                asset: Some(policy_asset),
                n: 0,
                script_pub_key: ScriptPubKey {
                    script_type: ScriptPubKey::TYPE_NULL_DATA.to_owned(),
                    pegout_chain: Some(
                        "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
                            .to_owned(),
                    ),
                    pegout_addresses: vec![destination.to_owned()],
                    ..Default::default()
                },
            },
            SidechainVout {
                value: Some(Amount::from_sat(250)),
                asset: Some(policy_asset),
                n: 1,
                script_pub_key: ScriptPubKey {
                    script_type: "fee".to_owned(),
                    ..Default::default()
                },
            },
        ],
    }
}

pub async fn temp_db() -> (tempfile::TempDir, Db) {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open_file(dir.path().join("db.sqlite"), std::time::Duration::from_secs(5))
        .await
        .unwrap();
    (dir, db)
}

#[derive(Default)]
struct SidechainState {
    tip: u32,
    blocks: BTreeMap<u32, Block<SidechainTx>>,
    fetched: Vec<u32>,
    fail_at: Option<u32>,
}

/// Sidechain where every height up to the tip exists, empty unless added.
/// Clones share the same chain.
#[derive(Clone, Default)]
pub struct MockSidechain {
    state: Arc<Mutex<SidechainState>>,
}

impl MockSidechain {
    pub fn new(tip: u32) -> Self {
        let mock = MockSidechain::default();
        mock.set_tip(tip);
        mock
    }

    pub fn set_tip(&self, tip: u32) {
        self.state.lock().unwrap().tip = tip;
    }

    pub fn add_block(&self, height: u32, time: i64, tx: Vec<SidechainTx>) {
        let mut state = self.state.lock().unwrap();
        state.tip = state.tip.max(height);
        state.blocks.insert(height, Block { height, time, tx });
    }

    /// Block fetches at `height` fail until cleared
    pub fn fail_at(&self, height: Option<u32>) {
        self.state.lock().unwrap().fail_at = height;
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.state.lock().unwrap().fetched.clone()
    }
}

impl Sidechain for MockSidechain {
    async fn chain_tip_height(&self) -> Result<u32, anyhow::Error> {
        Ok(self.state.lock().unwrap().tip)
    }

    async fn block_hash(&self, height: u32) -> Result<elements::BlockHash, anyhow::Error> {
        let state = self.state.lock().unwrap();
        anyhow::ensure!(height <= state.tip, "block height {height} out of range");
        Ok(sidechain_block_hash(height))
    }

    async fn block(&self, hash: elements::BlockHash) -> Result<Block<SidechainTx>, anyhow::Error> {
        let height = hash_height(hash.to_byte_array());
        let mut state = self.state.lock().unwrap();
        anyhow::ensure!(state.fail_at != Some(height), "sidechain node is down");
        state.fetched.push(height);
        let block = state.blocks.get(&height).cloned().unwrap_or(Block {
            height,
            time: JAN_2024 + i64::from(height) * 60,
            tx: Vec::new(),
        });
        Ok(block)
    }
}

#[derive(Default)]
struct ParentState {
    tip: u32,
    headers: u32,
    blocks: BTreeMap<u32, Block<ParentTx>>,
    txs: HashMap<bitcoin::Txid, ParentTx>,
    utxos: BTreeMap<OutPoint, ParentVout>,
    fetched: Vec<u32>,
    tx_out_calls: Vec<OutPoint>,
    fail_block_at: Option<u32>,
}

/// Parent chain with a UTXO set maintained by `add_block`.
/// Clones share the same chain.
#[derive(Clone, Default)]
pub struct MockParent {
    state: Arc<Mutex<ParentState>>,
}

impl MockParent {
    pub fn new(tip: u32) -> Self {
        let mock = MockParent::default();
        mock.set_tip(tip);
        mock
    }

    pub fn set_tip(&self, tip: u32) {
        let mut state = self.state.lock().unwrap();
        state.tip = tip;
        state.headers = tip;
    }

    pub fn set_headers(&self, headers: u32) {
        self.state.lock().unwrap().headers = headers;
    }

    pub fn add_block(&self, height: u32, time: i64, txs: Vec<ParentTx>) {
        let mut state = self.state.lock().unwrap();
        let mut block_txs = Vec::new();
        for mut tx in txs {
            tx.blockhash = Some(parent_block_hash(height));
            for outpoint in tx.vin.iter().filter_map(ParentVin::outpoint) {
                state.utxos.remove(&outpoint);
            }
            for vout in tx.vout.iter() {
                let outpoint = OutPoint {
                    txid: tx.txid,
                    vout: vout.n,
                };
                state.utxos.insert(outpoint, vout.clone());
            }
            state.txs.insert(tx.txid, tx.clone());
            block_txs.push(tx);
        }
        state.blocks.insert(
            height,
            Block {
                height,
                time,
                tx: block_txs,
            },
        );
        if state.tip < height {
            state.tip = height;
            state.headers = height;
        }
    }

    /// Known to `getrawtransaction` but not confirmed
    pub fn add_mempool_tx(&self, tx: ParentTx) {
        self.state.lock().unwrap().txs.insert(tx.txid, tx);
    }

    pub fn fail_block_at(&self, height: Option<u32>) {
        self.state.lock().unwrap().fail_block_at = height;
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.state.lock().unwrap().fetched.clone()
    }

    pub fn tx_out_calls(&self) -> Vec<OutPoint> {
        self.state.lock().unwrap().tx_out_calls.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state.lock().unwrap();
        state.fetched.clear();
        state.tx_out_calls.clear();
    }

    fn block_time(state: &ParentState, height: u32) -> i64 {
        state
            .blocks
            .get(&height)
            .map(|block| block.time)
            .unwrap_or(JAN_2024 + i64::from(height) * 600)
    }
}

impl ParentChain for MockParent {
    async fn chain_tip_height(&self) -> Result<u32, anyhow::Error> {
        Ok(self.state.lock().unwrap().tip)
    }

    async fn blockchain_info(&self) -> Result<BlockchainInfo, anyhow::Error> {
        let state = self.state.lock().unwrap();
        Ok(BlockchainInfo {
            chain: "main".to_owned(),
            blocks: state.tip,
            headers: state.headers,
        })
    }

    async fn block_hash(&self, height: u32) -> Result<bitcoin::BlockHash, anyhow::Error> {
        let state = self.state.lock().unwrap();
        anyhow::ensure!(height <= state.tip, "block height {height} out of range");
        Ok(parent_block_hash(height))
    }

    async fn block(&self, hash: bitcoin::BlockHash) -> Result<Block<ParentTx>, anyhow::Error> {
        let height = hash_height(hash.to_byte_array());
        let mut state = self.state.lock().unwrap();
        anyhow::ensure!(state.fail_block_at != Some(height), "parent node is down");
        state.fetched.push(height);
        let block = state.blocks.get(&height).cloned().unwrap_or(Block {
            height,
            time: Self::block_time(&state, height),
            tx: Vec::new(),
        });
        Ok(block)
    }

    async fn block_info(&self, hash: bitcoin::BlockHash) -> Result<BlockInfo, anyhow::Error> {
        let height = hash_height(hash.to_byte_array());
        let state = self.state.lock().unwrap();
        Ok(BlockInfo {
            height,
            time: Self::block_time(&state, height),
        })
    }

    async fn raw_transaction(&self, txid: bitcoin::Txid) -> Result<ParentTx, anyhow::Error> {
        let state = self.state.lock().unwrap();
        state
            .txs
            .get(&txid)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No such mempool or blockchain transaction"))
    }

    async fn tx_out(&self, outpoint: OutPoint) -> Result<GetTxOutCallResp, anyhow::Error> {
        let mut state = self.state.lock().unwrap();
        state.tx_out_calls.push(outpoint);
        let tip = state.tip;
        let value = state.utxos.get(&outpoint).map(|vout| GetTxOutValue {
            bestblock: parent_block_hash(tip),
            confirmations: 1,
            value: vout.value,
            script_pub_key: vout.script_pub_key.clone(),
            coinbase: false,
        });
        Ok(value)
    }
}
