use chrono::Duration;
use log::*;
use market_engine::{events::EventProducers, HandoverFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// Errors from an individual pass are logged and swallowed; a failed pass leaves the database
/// untouched and the next tick simply tries again.
pub fn start_reconciliation_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    abandonment_window: Duration,
    sweep_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(sweep_interval_secs));
        let api = HandoverFlowApi::new(db, producers);
        info!("🕰️ Reconciliation worker started. Sweeping every {sweep_interval_secs}s");
        loop {
            timer.tick().await;
            trace!("🕰️ Running reconciliation pass");
            match api.reconcile(abandonment_window).await {
                Ok(summary) => {
                    if summary.total() > 0 {
                        info!(
                            "🕰️ Reconciliation pass tidied {} rows ({} expired tokens, {} reclaimed reservations)",
                            summary.total(),
                            summary.expired_tokens,
                            summary.reclaimed_listings
                        );
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running reconciliation pass: {e}");
                },
            }
        }
    })
}
