//! Instance lifecycle orchestration.
//!
//! [`InstanceManager`] sequences creation, start/stop/restart and deletion
//! of tenant instances across the persistence port ([`InstanceStore`]) and
//! the container runtime ([`fleet_runtime::WorkloadRuntime`]).
//! [`RetentionManager`] purges archived data once its retention window has
//! elapsed.

pub mod config;
pub mod data_dir;
pub mod error;
pub mod locks;
pub mod manager;
pub mod pg_store;
pub mod retention;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::LifecycleConfig;
pub use error::LifecycleError;
pub use manager::{CreateInstanceRequest, CreatedInstance, InstanceManager, InstanceStats};
pub use pg_store::PgInstanceStore;
pub use retention::{DataPurger, FsDataPurger, RetentionManager, SweepOutcome};
pub use store::{InstanceStore, StoreError};
