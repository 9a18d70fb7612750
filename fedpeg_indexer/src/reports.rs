use bitcoin::{Amount, SignedAmount};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{
    db::{stored_amount, Db},
    error::Error,
    models::FederationUtxo,
};

/// Read-only aggregations for the API layer
#[derive(Clone)]
pub struct Reports {
    db: Db,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySupply {
    /// `YYYY-MM-01`
    pub month: String,
    /// Net pegged value of the month
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: SignedAmount,
    /// Supply at the end of the month
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub total: SignedAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReserves {
    pub month: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentSupply {
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: SignedAmount,
    pub last_block_update: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentReserves {
    pub amount: Amount,
    pub last_block_update: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressBalance {
    pub address: String,
    pub balance: Amount,
}

fn month_start(timestamp: i64) -> Result<Date, Error> {
    let date = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| Error::InvalidTimestamp(timestamp))?
        .date();
    Date::from_calendar_date(date.year(), date.month(), 1)
        .map_err(|_| Error::InvalidTimestamp(timestamp))
}

fn next_month(month: Date) -> Result<Date, Error> {
    let year = match month.month() {
        time::Month::December => month.year() + 1,
        _ => month.year(),
    };
    Date::from_calendar_date(year, month.month().next(), 1)
        .map_err(|_| Error::InvalidTimestamp(timestamp(month)))
}

fn timestamp(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

fn month_name(date: Date) -> String {
    format!("{:04}-{:02}-01", date.year(), u8::from(date.month()))
}

/// Spend time of a spent UTXO, creation time otherwise
fn last_activity(utxo: &FederationUtxo) -> i64 {
    if utxo.is_unspent {
        utxo.created_block_time
    } else {
        utxo.last_verified_time.max(utxo.created_block_time)
    }
}

/// Counted if created before the month ends and not spent before it starts
fn overlaps(utxo: &FederationUtxo, start: i64, end: i64) -> bool {
    utxo.created_block_time < end && (utxo.is_unspent || utxo.last_verified_time >= start)
}

pub fn reserves_by_month(utxos: &[FederationUtxo]) -> Result<Vec<MonthlyReserves>, Error> {
    let Some(first) = utxos.iter().map(|utxo| utxo.created_block_time).min() else {
        return Ok(Vec::new());
    };
    let last = utxos.iter().map(last_activity).max().unwrap_or(first);

    let last_month = month_start(last)?;
    let mut month = month_start(first)?;
    let mut rows = Vec::new();
    while month <= last_month {
        let next = next_month(month)?;
        let (start, end) = (timestamp(month), timestamp(next));
        let amount = utxos
            .iter()
            .filter(|utxo| overlaps(utxo, start, end))
            .map(|utxo| utxo.amount)
            .sum::<Amount>();
        rows.push(MonthlyReserves {
            month: month_name(month),
            amount,
        });
        month = next;
    }
    Ok(rows)
}

impl Reports {
    pub fn new(db: Db) -> Self {
        Reports { db }
    }

    pub async fn supply_by_month(&self) -> Result<Vec<MonthlySupply>, Error> {
        let mut total = SignedAmount::ZERO;
        let rows = self
            .db
            .peg_sums_by_month()
            .await?
            .into_iter()
            .map(|row| {
                let amount = SignedAmount::from_sat(row.amount);
                total += amount;
                MonthlySupply {
                    month: row.month,
                    amount,
                    total,
                }
            })
            .collect();
        Ok(rows)
    }

    pub async fn reserves_by_month(&self) -> Result<Vec<MonthlyReserves>, Error> {
        let utxos = self.db.load_federation_utxos().await?;
        reserves_by_month(&utxos)
    }

    pub async fn current_supply(&self) -> Result<CurrentSupply, Error> {
        Ok(CurrentSupply {
            amount: self.db.total_pegged().await?,
            last_block_update: self.db.last_sidechain_block().await?,
        })
    }

    pub async fn current_reserves(&self) -> Result<CurrentReserves, Error> {
        Ok(CurrentReserves {
            amount: self.db.total_reserves().await?,
            last_block_update: self.db.last_parent_block_audit().await?,
        })
    }

    pub async fn top_addresses(&self) -> Result<Vec<AddressBalance>, Error> {
        self.db
            .reserves_by_address()
            .await?
            .into_iter()
            .map(|row| {
                Ok::<_, Error>(AddressBalance {
                    balance: stored_amount("address balance", row.balance)?,
                    address: row.address,
                })
            })
            .collect()
    }

    /// Newest first
    pub async fn current_utxos(&self) -> Result<Vec<FederationUtxo>, Error> {
        self.db.load_unspent_utxos().await
    }

    pub async fn federation_addresses(&self) -> Result<Vec<String>, Error> {
        self.db.load_federation_addresses().await
    }
}
