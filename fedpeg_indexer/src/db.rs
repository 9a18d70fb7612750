use std::{collections::BTreeSet, path::Path, time::Duration};

use bitcoin::{Amount, OutPoint, SignedAmount};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    types::Text,
    Sqlite, SqlitePool,
};

use crate::{
    error::Error,
    models::{FederationUtxo, PegEvent, PegInSource},
};

const LAST_SIDECHAIN_BLOCK: &str = "last_sidechain_block";
const LAST_PARENT_BLOCK_AUDIT: &str = "last_parent_block_audit";

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// Exclusive write transaction, one per unit of work
pub struct DbTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[derive(sqlx::FromRow)]
struct PegEventRow {
    sidechain_height: u32,
    sidechain_block_time: i64,
    amount: i64,
    sidechain_txid: Text<elements::Txid>,
    sidechain_index: u32,
    parent_address: String,
    parent_txid: Option<Text<bitcoin::Txid>>,
    parent_vout: Option<u32>,
    parent_block_height: Option<u32>,
    parent_block_time: Option<i64>,
    is_final_tx: bool,
}

impl From<PegEventRow> for PegEvent {
    fn from(row: PegEventRow) -> Self {
        let parent = match (
            row.parent_txid,
            row.parent_vout,
            row.parent_block_height,
            row.parent_block_time,
        ) {
            (Some(txid), Some(vout), Some(block_height), Some(block_time)) => Some(PegInSource {
                txid: txid.0,
                vout,
                block_height,
                block_time,
            }),
            _ => None,
        };
        PegEvent {
            sidechain_height: row.sidechain_height,
            sidechain_block_time: row.sidechain_block_time,
            amount: SignedAmount::from_sat(row.amount),
            sidechain_txid: row.sidechain_txid.0,
            sidechain_index: row.sidechain_index,
            parent_address: row.parent_address,
            parent,
            is_final_tx: row.is_final_tx,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FederationUtxoRow {
    parent_txid: Text<bitcoin::Txid>,
    parent_vout: u32,
    address: String,
    amount: i64,
    created_block_height: u32,
    created_block_time: i64,
    is_unspent: bool,
    last_verified_height: u32,
    last_verified_time: i64,
}

impl TryFrom<FederationUtxoRow> for FederationUtxo {
    type Error = Error;

    fn try_from(row: FederationUtxoRow) -> Result<Self, Error> {
        Ok(FederationUtxo {
            txid: row.parent_txid.0,
            vout: row.parent_vout,
            address: row.address,
            amount: stored_amount("federation utxo", row.amount)?,
            created_block_height: row.created_block_height,
            created_block_time: row.created_block_time,
            is_unspent: row.is_unspent,
            last_verified_height: row.last_verified_height,
            last_verified_time: row.last_verified_time,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MonthlySum {
    pub month: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AddressSum {
    pub address: String,
    pub balance: i64,
}

/// Reserve sums and UTXO amounts are never negative, anything else is a corrupt row
pub fn stored_amount(what: &'static str, sats: i64) -> Result<Amount, Error> {
    u64::try_from(sats)
        .map(Amount::from_sat)
        .map_err(|_| Error::NegativeAmount(what, sats))
}

fn sat_i64(amount: Amount) -> Result<i64, Error> {
    i64::try_from(amount.to_sat()).map_err(|_| Error::AmountOverflow(amount))
}

async fn load_state<'e, E>(executor: E, name: &str) -> Result<Option<u32>, Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let number = sqlx::query_scalar::<_, Option<u32>>("select number from state where name = ?")
        .bind(name)
        .fetch_one(executor)
        .await?;
    Ok(number)
}

impl Db {
    async fn open_with_options(options: SqliteConnectOptions) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .connect_with(options.foreign_keys(true))
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn open_file(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        Self::open_with_options(options).await
    }

    /// Starts with `BEGIN IMMEDIATE` so the write lock is held from the first read
    pub async fn begin(&self) -> Result<DbTx, Error> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(DbTx { tx })
    }

    pub async fn last_sidechain_block(&self) -> Result<Option<u32>, Error> {
        load_state(&self.pool, LAST_SIDECHAIN_BLOCK).await
    }

    pub async fn last_parent_block_audit(&self) -> Result<Option<u32>, Error> {
        load_state(&self.pool, LAST_PARENT_BLOCK_AUDIT).await
    }

    pub async fn load_peg_events(&self) -> Result<Vec<PegEvent>, Error> {
        let rows = sqlx::query_as::<_, PegEventRow>(
            "select * from peg_events order by sidechain_height, sidechain_txid, sidechain_index",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PegEvent::from).collect())
    }

    pub async fn load_federation_utxos(&self) -> Result<Vec<FederationUtxo>, Error> {
        let rows = sqlx::query_as::<_, FederationUtxoRow>(
            "select * from federation_utxos order by created_block_height, parent_txid, parent_vout",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FederationUtxo::try_from).collect()
    }

    /// Newest first
    pub async fn load_unspent_utxos(&self) -> Result<Vec<FederationUtxo>, Error> {
        let rows = sqlx::query_as::<_, FederationUtxoRow>(
            "select * from federation_utxos where is_unspent = 1 order by created_block_time desc, parent_txid, parent_vout",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FederationUtxo::try_from).collect()
    }

    pub async fn load_federation_addresses(&self) -> Result<Vec<String>, Error> {
        let addresses =
            sqlx::query_scalar::<_, String>("select address from federation_addresses order by address")
                .fetch_all(&self.pool)
                .await?;
        Ok(addresses)
    }

    pub async fn peg_sums_by_month(&self) -> Result<Vec<MonthlySum>, Error> {
        let rows = sqlx::query_as::<_, MonthlySum>(
            "select strftime('%Y-%m-01', sidechain_block_time, 'unixepoch') as month, sum(amount) as amount
            from peg_events
            group by month
            order by month",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn total_pegged(&self) -> Result<SignedAmount, Error> {
        let sum = sqlx::query_scalar::<_, Option<i64>>("select sum(amount) from peg_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(SignedAmount::from_sat(sum.unwrap_or_default()))
    }

    pub async fn total_reserves(&self) -> Result<Amount, Error> {
        let sum = sqlx::query_scalar::<_, Option<i64>>(
            "select sum(amount) from federation_utxos where is_unspent = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        stored_amount("total reserves", sum.unwrap_or_default())
    }

    /// Unspent balance per address, largest first
    pub async fn reserves_by_address(&self) -> Result<Vec<AddressSum>, Error> {
        let rows = sqlx::query_as::<_, AddressSum>(
            "select address, sum(amount) as balance
            from federation_utxos
            where is_unspent = 1
            group by address
            order by balance desc, address",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

impl DbTx {
    pub async fn insert_peg_event(&mut self, event: &PegEvent) -> Result<(), Error> {
        let parent = event.parent.as_ref();
        sqlx::query(
            "insert into peg_events (sidechain_height, sidechain_block_time, amount, sidechain_txid, sidechain_index,
                parent_address, parent_txid, parent_vout, parent_block_height, parent_block_time, is_final_tx)
            values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.sidechain_height)
        .bind(event.sidechain_block_time)
        .bind(event.amount.to_sat())
        .bind(Text(event.sidechain_txid))
        .bind(event.sidechain_index)
        .bind(&event.parent_address)
        .bind(parent.map(|parent| Text(parent.txid)))
        .bind(parent.map(|parent| parent.vout))
        .bind(parent.map(|parent| parent.block_height))
        .bind(parent.map(|parent| parent.block_time))
        .bind(event.is_final_tx)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn add_federation_address(&mut self, address: &str) -> Result<(), Error> {
        sqlx::query("insert or ignore into federation_addresses (address) values (?)")
            .bind(address)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Returns false if the outpoint is already tracked
    pub async fn insert_federation_utxo(&mut self, utxo: &FederationUtxo) -> Result<bool, Error> {
        let res = sqlx::query(
            "insert into federation_utxos (parent_txid, parent_vout, address, amount, created_block_height,
                created_block_time, is_unspent, last_verified_height, last_verified_time)
            values (?, ?, ?, ?, ?, ?, ?, ?, ?)
            on conflict (parent_txid, parent_vout) do nothing",
        )
        .bind(Text(utxo.txid))
        .bind(utxo.vout)
        .bind(&utxo.address)
        .bind(sat_i64(utxo.amount)?)
        .bind(utxo.created_block_height)
        .bind(utxo.created_block_time)
        .bind(utxo.is_unspent)
        .bind(utxo.last_verified_height)
        .bind(utxo.last_verified_time)
        .execute(&mut *self.tx)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn tracked_outpoints(
        &mut self,
        outpoints: &[OutPoint],
    ) -> Result<BTreeSet<OutPoint>, Error> {
        let mut tracked = BTreeSet::new();
        for outpoint in outpoints {
            let count = sqlx::query_scalar::<_, i64>(
                "select count(*) from federation_utxos where parent_txid = ? and parent_vout = ?",
            )
            .bind(Text(outpoint.txid))
            .bind(outpoint.vout)
            .fetch_one(&mut *self.tx)
            .await?;
            if count > 0 {
                tracked.insert(*outpoint);
            }
        }
        Ok(tracked)
    }

    /// Unspent UTXOs last verified at `height - 1`
    pub async fn load_due_utxos(&mut self, height: u32) -> Result<Vec<FederationUtxo>, Error> {
        let rows = sqlx::query_as::<_, FederationUtxoRow>(
            "select * from federation_utxos
            where is_unspent = 1 and last_verified_height = ?
            order by parent_txid, parent_vout",
        )
        .bind(height.saturating_sub(1))
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(FederationUtxo::try_from).collect()
    }

    /// Never moves the watermark backwards and never touches spent rows
    pub async fn advance_verified_height(
        &mut self,
        outpoint: OutPoint,
        height: u32,
        time: Option<i64>,
    ) -> Result<(), Error> {
        sqlx::query(
            "update federation_utxos
            set last_verified_height = max(last_verified_height, ?),
                last_verified_time = coalesce(?, last_verified_time)
            where parent_txid = ? and parent_vout = ? and is_unspent = 1",
        )
        .bind(height)
        .bind(time)
        .bind(Text(outpoint.txid))
        .bind(outpoint.vout)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn mark_spent(
        &mut self,
        outpoint: OutPoint,
        height: u32,
        time: i64,
    ) -> Result<(), Error> {
        sqlx::query(
            "update federation_utxos
            set is_unspent = 0,
                last_verified_height = max(last_verified_height, ?),
                last_verified_time = ?
            where parent_txid = ? and parent_vout = ? and is_unspent = 1",
        )
        .bind(height)
        .bind(time)
        .bind(Text(outpoint.txid))
        .bind(outpoint.vout)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn set_last_sidechain_block(&mut self, height: u32) -> Result<(), Error> {
        sqlx::query("update state set number = ? where name = ?")
            .bind(height)
            .bind(LAST_SIDECHAIN_BLOCK)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    pub async fn last_parent_block_audit(&mut self) -> Result<Option<u32>, Error> {
        load_state(&mut *self.tx, LAST_PARENT_BLOCK_AUDIT).await
    }

    /// Sets the audit watermark to the lowest `last_verified_height` of the unspent UTXOs.
    /// Without unspent UTXOs `fallback` is used, or the stored value is kept when there is none.
    pub async fn refresh_audit_watermark(
        &mut self,
        fallback: Option<u32>,
    ) -> Result<Option<u32>, Error> {
        sqlx::query(
            "update state
            set number = coalesce(
                (select min(last_verified_height) from federation_utxos where is_unspent = 1),
                ?,
                number)
            where name = ?",
        )
        .bind(fallback)
        .bind(LAST_PARENT_BLOCK_AUDIT)
        .execute(&mut *self.tx)
        .await?;
        self.last_parent_block_audit().await
    }

    pub async fn commit(self) -> Result<(), Error> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), Error> {
        self.tx.rollback().await?;
        Ok(())
    }

    /// Commits on success, rolls back and returns the original error otherwise
    pub async fn finish<T>(self, res: Result<T, Error>) -> Result<T, Error> {
        match res {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    log::error!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }
}
