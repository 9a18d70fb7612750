use std::collections::BTreeSet;

use bitcoin::OutPoint;
use fedpeg_common::rpc::get_block::{Block, ParentTx, ParentVin};

use crate::{
    chain::ParentChain,
    db::{Db, DbTx},
    error::Error,
    federation::FederationAddresses,
    models::{FederationUtxo, PassOutcome, SkipReason},
    run_guard::RunGuard,
};

/// Blocks this close to the parent tip are never examined
pub const CONFIRMATIONS_MARGIN: u32 = 2;

pub fn confirmed_tip(tip: u32) -> u32 {
    tip.saturating_sub(CONFIRMATIONS_MARGIN)
}

/// Re-verifies the tracked federation UTXOs against the parent chain, one height at a time
pub struct ReserveAuditor<P> {
    db: Db,
    parent: P,
    change_addresses: FederationAddresses,
    guard: RunGuard,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub heights: u32,
    pub last_height: Option<u32>,
    pub checked: u32,
    pub spent: u32,
    pub created: u32,
    pub unresolved: u32,
}

/// Result of auditing one parent height
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditStep {
    pub height: u32,
    /// Number of due UTXOs
    pub checked: u32,
    pub still_unspent: u32,
    pub spent: Vec<OutPoint>,
    pub created: Vec<OutPoint>,
    pub unresolved: Vec<OutPoint>,
    /// Audit watermark after the step
    pub watermark: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockScan {
    pub spent: BTreeSet<OutPoint>,
    /// New change outputs, in block order
    pub created: Vec<FederationUtxo>,
    /// Candidates not spent in the block
    pub unresolved: BTreeSet<OutPoint>,
}

/// Outputs of `block` paying one of `change_addresses`
pub fn change_outputs(
    block: &Block<ParentTx>,
    change_addresses: &FederationAddresses,
) -> Vec<OutPoint> {
    block
        .tx
        .iter()
        .flat_map(|tx| {
            tx.vout
                .iter()
                .filter(|vout| {
                    vout.script_pub_key
                        .address()
                        .is_some_and(|address| change_addresses.contains(address))
                })
                .map(|vout| OutPoint {
                    txid: tx.txid,
                    vout: vout.n,
                })
        })
        .collect()
}

/// Finds which `candidates` are spent in `block` and which change outputs it creates.
/// `tracked` lists the change outputs already stored, those are not created again.
/// Change outputs created here are watched for spends by later transactions of the same block.
pub fn scan_block(
    block: &Block<ParentTx>,
    candidates: &BTreeSet<OutPoint>,
    change_addresses: &FederationAddresses,
    tracked: &BTreeSet<OutPoint>,
) -> BlockScan {
    let mut watched = candidates.clone();
    let mut scan = BlockScan::default();

    for tx in block.tx.iter() {
        for outpoint in tx.vin.iter().filter_map(ParentVin::outpoint) {
            if watched.contains(&outpoint) {
                scan.spent.insert(outpoint);
            }
        }

        for vout in tx.vout.iter() {
            let Some(address) = vout.script_pub_key.address() else {
                continue;
            };
            let outpoint = OutPoint {
                txid: tx.txid,
                vout: vout.n,
            };
            if change_addresses.contains(address)
                && !tracked.contains(&outpoint)
                && watched.insert(outpoint)
            {
                scan.created.push(FederationUtxo {
                    txid: tx.txid,
                    vout: vout.n,
                    address: address.to_owned(),
                    amount: vout.value,
                    created_block_height: block.height,
                    created_block_time: block.time,
                    is_unspent: true,
                    last_verified_height: block.height,
                    last_verified_time: block.time,
                });
            }
        }
    }

    scan.unresolved = candidates.difference(&scan.spent).copied().collect();
    scan
}

impl<P: ParentChain> ReserveAuditor<P> {
    pub fn new(db: Db, parent: P, change_addresses: FederationAddresses) -> Self {
        ReserveAuditor {
            db,
            parent,
            change_addresses,
            guard: RunGuard::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    pub async fn run(&self) -> Result<PassOutcome<AuditReport>, Error> {
        let Some(_token) = self.guard.try_acquire() else {
            log::debug!("reserve audit pass is already running");
            return Ok(PassOutcome::AlreadyRunning);
        };

        let Some(mut watermark) = self.db.last_parent_block_audit().await? else {
            log::debug!("no federation utxos recorded yet, skip reserve audit");
            return Ok(PassOutcome::Skipped(SkipReason::NoFederationUtxos));
        };

        let info = self.parent.blockchain_info().await?;
        if !info.is_synced() {
            log::warn!(
                "parent node is not synced ({}/{} blocks), skip reserve audit",
                info.blocks,
                info.headers
            );
            return Ok(PassOutcome::Skipped(SkipReason::ParentNotSynced {
                blocks: info.blocks,
                headers: info.headers,
            }));
        }

        let mut report = AuditReport::default();
        loop {
            let height = watermark + 1;
            let confirmed_tip = confirmed_tip(self.parent.chain_tip_height().await?);
            if height > confirmed_tip {
                break;
            }

            let mut tx = self.db.begin().await?;
            let res = self.audit_height(&mut tx, height, confirmed_tip).await;
            let step = tx.finish(res).await?;

            report.heights += 1;
            report.last_height = Some(height);
            report.checked += step.checked;
            report.spent += step.spent.len() as u32;
            report.created += step.created.len() as u32;
            report.unresolved += step.unresolved.len() as u32;

            watermark = step.watermark.unwrap_or(height);
        }

        if report.heights > 0 {
            log::info!(
                "reserve audit done up to parent block {:?}: {} utxos checked, {} spent, {} change outputs found",
                report.last_height,
                report.checked,
                report.spent,
                report.created,
            );
        }

        Ok(PassOutcome::Done(report))
    }

    async fn audit_height(
        &self,
        tx: &mut DbTx,
        height: u32,
        confirmed_tip: u32,
    ) -> Result<AuditStep, Error> {
        let due = tx.load_due_utxos(height).await?;
        log::debug!(
            "{} federation utxos due in parent block {height}/{confirmed_tip}",
            due.len()
        );

        let mut step = AuditStep {
            height,
            checked: due.len() as u32,
            ..Default::default()
        };

        let mut candidates = BTreeSet::new();
        for utxo in due.iter() {
            let outpoint = utxo.outpoint();
            match self.parent.tx_out(outpoint).await? {
                // Trusts the node's UTXO set to be current: unspent now means unspent
                // at every height up to the confirmed tip. A lagging node breaks this.
                Some(_) => {
                    tx.advance_verified_height(outpoint, confirmed_tip, None)
                        .await?;
                    step.still_unspent += 1;
                }
                None => {
                    candidates.insert(outpoint);
                }
            }
        }

        if !candidates.is_empty() {
            log::debug!(
                "{} federation utxos are spent as of tip, scanning parent block {height}",
                candidates.len()
            );

            let hash = self.parent.block_hash(height).await?;
            let block = self.parent.block(hash).await?;
            let outputs = change_outputs(&block, &self.change_addresses);
            let tracked = tx.tracked_outpoints(&outputs).await?;
            let scan = scan_block(&block, &candidates, &self.change_addresses, &tracked);

            for utxo in scan.created.iter() {
                log::debug!(
                    "new federation change output {} ({}) in parent block {height}",
                    utxo.outpoint(),
                    utxo.amount,
                );
                tx.insert_federation_utxo(utxo).await?;
                step.created.push(utxo.outpoint());
            }

            for outpoint in scan.spent.iter() {
                tx.mark_spent(*outpoint, height, block.time).await?;
                step.spent.push(*outpoint);
            }

            for outpoint in scan.unresolved.iter() {
                log::warn!(
                    "federation utxo {outpoint} is missing from the utxo set but not spent in parent block {height}"
                );
                tx.advance_verified_height(*outpoint, height, Some(block.time))
                    .await?;
                step.unresolved.push(*outpoint);
            }
        }

        step.watermark = tx.refresh_audit_watermark(Some(height)).await?;

        Ok(step)
    }
}
