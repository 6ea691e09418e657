//! Shared harness for lifecycle tests: an [`InstanceManager`] wired to the
//! in-memory store and the fake runtime, with data directories under a
//! temporary root.

#![allow(dead_code)]

use std::sync::Arc;

use fleet_core::credentials::AdminCredentials;
use fleet_lifecycle::testing::{FakeRuntime, MemoryStore};
use fleet_lifecycle::{
    CreateInstanceRequest, CreatedInstance, InstanceManager, InstanceStore, LifecycleConfig,
};
use fleet_runtime::WorkloadRuntime;
use tempfile::TempDir;
use uuid::Uuid;

pub struct Harness {
    pub manager: Arc<InstanceManager>,
    pub store: Arc<MemoryStore>,
    pub runtime: Arc<FakeRuntime>,
    pub root: TempDir,
}

pub fn harness() -> Harness {
    harness_with(|_| {})
}

pub fn harness_with(configure: impl FnOnce(&mut LifecycleConfig)) -> Harness {
    let root = tempfile::tempdir().expect("tempdir");
    let mut config = LifecycleConfig {
        base_domain: "example.com".into(),
        instances_base_path: root.path().join("instances"),
        ..LifecycleConfig::default()
    };
    configure(&mut config);

    let store = Arc::new(MemoryStore::new());
    let runtime = Arc::new(FakeRuntime::new());
    let manager = Arc::new(InstanceManager::new(
        Arc::clone(&store) as Arc<dyn InstanceStore>,
        Arc::clone(&runtime) as Arc<dyn WorkloadRuntime>,
        config,
    ));

    Harness {
        manager,
        store,
        runtime,
        root,
    }
}

pub fn credentials() -> AdminCredentials {
    AdminCredentials::new("admin@example.com", "correct-horse").expect("valid credentials")
}

pub fn request(owner_id: Uuid, owner_name: &str, name: &str) -> CreateInstanceRequest {
    CreateInstanceRequest {
        owner_id,
        owner_name: owner_name.to_string(),
        name: name.to_string(),
        credentials: credentials(),
    }
}

impl Harness {
    /// Create an instance for `owner_id` named `name`, owned by "alice".
    pub async fn create(&self, owner_id: Uuid, name: &str) -> CreatedInstance {
        self.manager
            .create(request(owner_id, "alice", name))
            .await
            .expect("create succeeds")
    }
}
