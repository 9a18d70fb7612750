use std::{future::Future, sync::Arc, time::Duration};

use fedpeg_indexer::{
    db::Db, error::Error, models::PassOutcome, peg_ledger::PegLedger,
    reserve_audit::ReserveAuditor, settings::Settings,
};
use fedpeg_types::retry_delay::RetryDelay;

/// Runs `pass` forever, sleeping `interval` after a successful run
/// and an increasing delay after a failed one
async fn run_loop<T, F, Fut>(name: &'static str, interval: Duration, pass: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<PassOutcome<T>, Error>>,
    T: std::fmt::Debug,
{
    let mut retry_delay = RetryDelay::default();
    loop {
        let delay = match pass().await {
            Ok(outcome) => {
                log::debug!("{name} pass finished: {outcome:?}");
                retry_delay.reset();
                interval
            }
            Err(err) => {
                let delay = retry_delay.next_delay();
                log::error!("{name} pass failed: {err}, retry in {delay:?}");
                delay
            }
        };
        tokio::time::sleep(delay).await;
    }
}

#[cfg(unix)]
async fn terminate() {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("can't install SIGTERM handler")
        .recv()
        .await;
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

async fn shutdown_signal() {
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.expect("can't listen for ctrl-c"),
        _ = terminate() => {},
    }
}

#[tokio::main]
async fn main() {
    let args = std::env::args().collect::<Vec<_>>();
    assert!(
        args.len() == 2,
        "Specify a single argument for the path to the config file"
    );
    let config_path = &args[1];

    let settings = Settings::load(config_path).expect("invalid config");

    std::fs::create_dir_all(&settings.work_dir).expect("can't create work_dir");
    fedpeg_indexer::logs::init(&settings.work_dir);

    let network = settings.network.d();
    log::info!("starting fedpeg indexer, network: {}", network.name);

    let change_addresses = settings
        .change_addresses()
        .expect("invalid federation change address");
    if change_addresses.is_empty() {
        log::warn!("no federation change addresses configured, change outputs will not be tracked");
    } else {
        log::info!("tracking {} federation change addresses", change_addresses.len());
    }

    let db_file = settings.work_dir.join("db.sqlite");
    let db = Db::open_file(db_file, settings.db_busy_timeout.duration())
        .await
        .expect("can't open db");

    let ledger = Arc::new(PegLedger::new(
        db.clone(),
        settings.sidechain_rpc.clone(),
        settings.parent_rpc.clone(),
        network.policy_asset,
        settings.sidechain_start_height,
    ));
    let auditor = Arc::new(ReserveAuditor::new(
        db.clone(),
        settings.parent_rpc.clone(),
        change_addresses,
    ));

    let ledger_task = tokio::spawn(run_loop(
        "peg ledger",
        settings.ledger_interval.duration(),
        move || {
            let ledger = Arc::clone(&ledger);
            async move { ledger.run().await }
        },
    ));
    let audit_task = tokio::spawn(run_loop(
        "reserve audit",
        settings.audit_interval.duration(),
        move || {
            let auditor = Arc::clone(&auditor);
            async move { auditor.run().await }
        },
    ));

    shutdown_signal().await;
    log::info!("shutting down");

    ledger_task.abort();
    audit_task.abort();
    let _ = ledger_task.await;
    let _ = audit_task.await;

    db.close().await;
}
