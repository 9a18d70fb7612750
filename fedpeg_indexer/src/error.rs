#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("RPC request failed: {0}")]
    Rpc(#[from] anyhow::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("parent transaction {txid} has no output {vout}")]
    MissingPrevout { txid: bitcoin::Txid, vout: u32 },
    #[error("peg-in parent transaction {0} is not confirmed")]
    UnconfirmedPegIn(bitcoin::Txid),
    #[error("amount out of range: {0}")]
    AmountOverflow(bitcoin::Amount),
    #[error("negative amount stored for {0}: {1}")]
    NegativeAmount(&'static str, i64),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
