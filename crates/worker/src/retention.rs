//! Periodic purge of archived instance data past its retention deadline.

use std::time::Duration;

use chrono::Utc;
use fleet_core::retention::format_megabytes;
use fleet_lifecycle::RetentionManager;
use tokio_util::sync::CancellationToken;

/// Run the retention sweep every `interval` until `cancel` is triggered.
///
/// The first sweep runs immediately. A failed sweep is logged and retried on
/// the next tick.
pub async fn run(sweeper: RetentionManager, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Retention sweep job started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention sweep job stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweeper.sweep_expired(Utc::now()).await {
                    Ok(outcome) => {
                        let report = outcome.report;
                        if report.examined > 0 {
                            tracing::info!(
                                examined = report.examined,
                                purged = report.purged,
                                failed = report.failed,
                                reclaimed = %format_megabytes(report.reclaimed_mb),
                                "Retention sweep: purged expired data"
                            );
                        } else {
                            tracing::debug!("Retention sweep: nothing expired");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Retention sweep failed");
                    }
                }
            }
        }
    }
}
