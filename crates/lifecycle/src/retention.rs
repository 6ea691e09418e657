//! Retention sweep over archived instances.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fleet_core::retention::SweepReport;
use fleet_core::types::Timestamp;
use fleet_db::models::archive::ArchivedInstance;

use crate::data_dir;
use crate::error::LifecycleError;
use crate::store::InstanceStore;

/// Physically removes an archived instance's data.
#[async_trait]
pub trait DataPurger: Send + Sync {
    /// Remove everything at `path`. Must succeed when `path` does not exist.
    async fn purge(&self, path: &Path) -> io::Result<()>;
}

/// Removes data directories from the local filesystem.
pub struct FsDataPurger;

#[async_trait]
impl DataPurger for FsDataPurger {
    async fn purge(&self, path: &Path) -> io::Result<()> {
        data_dir::remove(path).await
    }
}

/// Result of [`RetentionManager::sweep_expired`].
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// Records purged by this run, with `data_available` already false.
    pub purged: Vec<ArchivedInstance>,
    pub report: SweepReport,
}

/// Purges archived data whose retention deadline has passed.
///
/// Has no schedule of its own; a caller decides when to sweep.
pub struct RetentionManager {
    store: Arc<dyn InstanceStore>,
    purger: Arc<dyn DataPurger>,
}

impl RetentionManager {
    pub fn new(store: Arc<dyn InstanceStore>, purger: Arc<dyn DataPurger>) -> Self {
        Self { store, purger }
    }

    /// Purge every record whose deadline is before `now` and whose data is
    /// still available.
    ///
    /// For each record the data directory is removed first and the flag is
    /// flipped second. A record whose directory cannot be removed keeps its
    /// flag and is retried on the next sweep. Running twice without `now`
    /// moving is a no-op the second time.
    pub async fn sweep_expired(&self, now: Timestamp) -> Result<SweepOutcome, LifecycleError> {
        let expired = self.store.find_expired_archives(now).await?;
        let mut report = SweepReport {
            examined: expired.len(),
            ..Default::default()
        };
        let mut purged = Vec::new();

        for mut record in expired {
            let path = Path::new(&record.data_path);
            if let Err(e) = self.purger.purge(path).await {
                tracing::warn!(
                    instance_id = %record.id,
                    path = %path.display(),
                    error = %e,
                    "Failed to purge archived data, will retry",
                );
                report.failed += 1;
                continue;
            }

            match self.store.mark_data_purged(record.id).await {
                Ok(true) => {
                    report.purged += 1;
                    report.reclaimed_mb += record.data_size_mb;
                    record.data_available = false;
                    tracing::info!(
                        instance_id = %record.id,
                        data_size_mb = record.data_size_mb,
                        "Archived data purged",
                    );
                    purged.push(record);
                }
                // Another sweep flipped it first.
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(instance_id = %record.id, error = %e, "Failed to flag purged data");
                    report.failed += 1;
                }
            }
        }

        Ok(SweepOutcome { purged, report })
    }
}
