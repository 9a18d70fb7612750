use std::future::Future;

use anyhow::anyhow;
use fedpeg_common::rpc::{
    get_block::{
        Block, BlockInfo, GetParentBlockCall, GetParentBlockInfoCall,
        GetSidechainBlockCall, ParentTx, SidechainTx,
    },
    get_block_hash::GetBlockHashCall,
    get_blockchain_info::{BlockchainInfo, GetBlockchainInfoCall},
    get_chain_tips::{active_tip_height, GetChainTipsCall},
    get_raw_transaction::GetRawTransactionCall,
    get_tx_out::{GetTxOutCall, GetTxOutCallResp},
    make_rpc_call, RpcServer,
};

/// Read-only view of the parent (Bitcoin) node
pub trait ParentChain: Send + Sync {
    fn chain_tip_height(&self) -> impl Future<Output = Result<u32, anyhow::Error>> + Send;

    fn blockchain_info(&self)
        -> impl Future<Output = Result<BlockchainInfo, anyhow::Error>> + Send;

    fn block_hash(
        &self,
        height: u32,
    ) -> impl Future<Output = Result<bitcoin::BlockHash, anyhow::Error>> + Send;

    fn block(
        &self,
        hash: bitcoin::BlockHash,
    ) -> impl Future<Output = Result<Block<ParentTx>, anyhow::Error>> + Send;

    fn block_info(
        &self,
        hash: bitcoin::BlockHash,
    ) -> impl Future<Output = Result<BlockInfo, anyhow::Error>> + Send;

    fn raw_transaction(
        &self,
        txid: bitcoin::Txid,
    ) -> impl Future<Output = Result<ParentTx, anyhow::Error>> + Send;

    /// Confirmed UTXO set lookup, mempool spends are ignored
    fn tx_out(
        &self,
        outpoint: bitcoin::OutPoint,
    ) -> impl Future<Output = Result<GetTxOutCallResp, anyhow::Error>> + Send;
}

/// Read-only view of the sidechain (Elements) node
pub trait Sidechain: Send + Sync {
    fn chain_tip_height(&self) -> impl Future<Output = Result<u32, anyhow::Error>> + Send;

    fn block_hash(
        &self,
        height: u32,
    ) -> impl Future<Output = Result<elements::BlockHash, anyhow::Error>> + Send;

    fn block(
        &self,
        hash: elements::BlockHash,
    ) -> impl Future<Output = Result<Block<SidechainTx>, anyhow::Error>> + Send;
}

async fn tip_height(rpc_server: &RpcServer) -> Result<u32, anyhow::Error> {
    let tips = make_rpc_call(rpc_server, GetChainTipsCall).await?;
    active_tip_height(&tips).ok_or_else(|| anyhow!("getchaintips returned no tips"))
}

impl ParentChain for RpcServer {
    async fn chain_tip_height(&self) -> Result<u32, anyhow::Error> {
        tip_height(self).await
    }

    async fn blockchain_info(&self) -> Result<BlockchainInfo, anyhow::Error> {
        make_rpc_call(self, GetBlockchainInfoCall).await
    }

    async fn block_hash(&self, height: u32) -> Result<bitcoin::BlockHash, anyhow::Error> {
        make_rpc_call(self, GetBlockHashCall::new(height)).await
    }

    async fn block(&self, hash: bitcoin::BlockHash) -> Result<Block<ParentTx>, anyhow::Error> {
        make_rpc_call(self, GetParentBlockCall::full(hash)).await
    }

    async fn block_info(&self, hash: bitcoin::BlockHash) -> Result<BlockInfo, anyhow::Error> {
        make_rpc_call(self, GetParentBlockInfoCall::info(hash)).await
    }

    async fn raw_transaction(&self, txid: bitcoin::Txid) -> Result<ParentTx, anyhow::Error> {
        make_rpc_call(self, GetRawTransactionCall { txid }).await
    }

    async fn tx_out(&self, outpoint: bitcoin::OutPoint) -> Result<GetTxOutCallResp, anyhow::Error> {
        make_rpc_call(
            self,
            GetTxOutCall {
                txid: outpoint.txid,
                n: outpoint.vout,
                include_mempool: false,
            },
        )
        .await
    }
}

impl Sidechain for RpcServer {
    async fn chain_tip_height(&self) -> Result<u32, anyhow::Error> {
        tip_height(self).await
    }

    async fn block_hash(&self, height: u32) -> Result<elements::BlockHash, anyhow::Error> {
        make_rpc_call(self, GetBlockHashCall::new(height)).await
    }

    async fn block(&self, hash: elements::BlockHash) -> Result<Block<SidechainTx>, anyhow::Error> {
        make_rpc_call(self, GetSidechainBlockCall::full(hash)).await
    }
}
