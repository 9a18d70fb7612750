pub mod chain;
pub mod classify;
pub mod db;
pub mod error;
pub mod federation;
pub mod logs;
pub mod models;
pub mod peg_ledger;
pub mod reports;
pub mod reserve_audit;
pub mod run_guard;
pub mod settings;

#[cfg(test)]
mod test_utils;
