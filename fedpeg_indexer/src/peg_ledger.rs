use bitcoin::{Amount, SignedAmount};
use fedpeg_common::rpc::get_block::{Block, SidechainTx};
use fedpeg_types::verify;

use crate::{
    chain::{ParentChain, Sidechain},
    classify::{classify_input, classify_output, PegClass},
    db::{Db, DbTx},
    error::Error,
    models::{PassOutcome, PegEvent, PegInSource},
    run_guard::RunGuard,
};

/// Walks the sidechain and records peg-ins and peg-outs.
/// Every peg-in also seeds the federation UTXO set for the reserve audit.
pub struct PegLedger<S, P> {
    db: Db,
    sidechain: S,
    parent: P,
    policy_asset: elements::AssetId,
    start_height: u32,
    guard: RunGuard,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LedgerReport {
    /// Last processed sidechain height, `None` if the pass had nothing to do
    pub last_height: Option<u32>,
    pub blocks: u32,
    pub peg_ins: u32,
    pub peg_outs: u32,
    pub seeded_utxos: u32,
}

struct ResolvedPegIn {
    source: PegInSource,
    amount: Amount,
    address: String,
}

fn signed(amount: Amount) -> Result<SignedAmount, Error> {
    amount.to_signed().map_err(|_| Error::AmountOverflow(amount))
}

impl<S: Sidechain, P: ParentChain> PegLedger<S, P> {
    pub fn new(
        db: Db,
        sidechain: S,
        parent: P,
        policy_asset: elements::AssetId,
        start_height: u32,
    ) -> Self {
        PegLedger {
            db,
            sidechain,
            parent,
            policy_asset,
            start_height,
            guard: RunGuard::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    pub async fn run(&self) -> Result<PassOutcome<LedgerReport>, Error> {
        let Some(_token) = self.guard.try_acquire() else {
            log::debug!("peg ledger pass is already running");
            return Ok(PassOutcome::AlreadyRunning);
        };

        let last_height = self.db.last_sidechain_block().await?;
        let tip = self.sidechain.chain_tip_height().await?;
        let first_height = last_height.map_or(self.start_height, |height| height + 1);

        let mut report = LedgerReport::default();
        for height in first_height..=tip {
            let events = self.block_events(height).await?;

            let mut tx = self.db.begin().await?;
            let res = store_block(&mut tx, height, &events).await;
            let seeded = tx.finish(res).await?;

            let peg_ins = events.iter().filter(|event| event.is_peg_in()).count() as u32;
            report.peg_ins += peg_ins;
            report.peg_outs += events.len() as u32 - peg_ins;
            report.seeded_utxos += seeded;
            report.blocks += 1;
            report.last_height = Some(height);
        }

        if report.blocks > 0 {
            log::info!(
                "peg ledger synced {} sidechain blocks up to {tip}: {} peg-ins, {} peg-outs",
                report.blocks,
                report.peg_ins,
                report.peg_outs,
            );
        }

        Ok(PassOutcome::Done(report))
    }

    async fn block_events(&self, height: u32) -> Result<Vec<PegEvent>, Error> {
        let hash = self.sidechain.block_hash(height).await?;
        let block = self.sidechain.block(hash).await?;
        let mut events = Vec::new();
        for tx in block.tx.iter() {
            self.tx_events(&block, tx, &mut events).await?;
        }
        log::debug!(
            "sidechain block {height} has {} txs, {} peg events",
            block.tx.len(),
            events.len()
        );
        Ok(events)
    }

    async fn tx_events(
        &self,
        block: &Block<SidechainTx>,
        tx: &SidechainTx,
        events: &mut Vec<PegEvent>,
    ) -> Result<(), Error> {
        for (index, vin) in tx.vin.iter().enumerate() {
            let PegClass::PegIn {
                parent_txid,
                parent_vout,
            } = classify_input(vin)
            else {
                continue;
            };
            let peg_in = self.resolve_peg_in(parent_txid, parent_vout).await?;
            events.push(PegEvent {
                sidechain_height: block.height,
                sidechain_block_time: block.time,
                amount: signed(peg_in.amount)?,
                sidechain_txid: tx.txid,
                sidechain_index: index as u32,
                parent_address: peg_in.address,
                parent: Some(peg_in.source),
                is_final_tx: true,
            });
        }

        for vout in tx.vout.iter() {
            let (amount, destination, is_final_tx) =
                match classify_output(vout, &self.policy_asset) {
                    PegClass::ExplicitPegOut {
                        amount,
                        destination,
                    } => (amount, destination, true),
                    PegClass::InferredPegOut {
                        amount,
                        destination,
                    } => (amount, destination, false),
                    PegClass::PegIn { .. } | PegClass::Ordinary => continue,
                };
            events.push(PegEvent {
                sidechain_height: block.height,
                sidechain_block_time: block.time,
                amount: -signed(amount)?,
                sidechain_txid: tx.txid,
                sidechain_index: vout.n,
                parent_address: destination,
                parent: None,
                is_final_tx,
            });
        }

        Ok(())
    }

    async fn resolve_peg_in(
        &self,
        txid: bitcoin::Txid,
        vout: u32,
    ) -> Result<ResolvedPegIn, Error> {
        let tx = self.parent.raw_transaction(txid).await?;
        let blockhash = tx.blockhash.ok_or(Error::UnconfirmedPegIn(txid))?;
        let block = self.parent.block_info(blockhash).await?;

        let prevout = tx
            .vout
            .get(vout as usize)
            .ok_or(Error::MissingPrevout { txid, vout })?;
        verify!(prevout.n == vout, Error::MissingPrevout { txid, vout });

        Ok(ResolvedPegIn {
            source: PegInSource {
                txid,
                vout: prevout.n,
                block_height: block.height,
                block_time: block.time,
            },
            amount: prevout.value,
            address: prevout
                .script_pub_key
                .address()
                .unwrap_or_default()
                .to_owned(),
        })
    }
}

/// Returns the number of newly tracked federation UTXOs
async fn store_block(tx: &mut DbTx, height: u32, events: &[PegEvent]) -> Result<u32, Error> {
    let mut seeded = 0;
    for event in events {
        tx.insert_peg_event(event).await?;

        if let Some(utxo) = event.federation_utxo() {
            tx.add_federation_address(&utxo.address).await?;
            if tx.insert_federation_utxo(&utxo).await? {
                seeded += 1;
            } else {
                log::warn!("federation utxo {} is already tracked", utxo.outpoint());
            }
        }
    }

    if seeded > 0 {
        let watermark = tx.refresh_audit_watermark(None).await?;
        log::debug!("seeded {seeded} federation utxos, audit watermark: {watermark:?}");
    }

    tx.set_last_sidechain_block(height).await?;

    Ok(seeded)
}
