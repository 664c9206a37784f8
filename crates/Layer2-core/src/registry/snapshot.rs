//! Registry Snapshot - 레지스트리 영속화
//!
//! 등록 순서를 보존한 descriptor 목록을 JSON으로 저장/복원한다.
//! handler(실행 코드)는 저장하지 않는다.

use super::descriptor::ServiceDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_foundation::{JsonStore, Result};

/// Current on-disk format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default snapshot filename inside the store
pub const DEFAULT_SNAPSHOT_FILE: &str = "registry.json";

/// Descriptors in registration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub services: Vec<ServiceDescriptor>,
}

impl RegistrySnapshot {
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            services,
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Write to `store/<file>` (atomic replace)
    pub fn save(&self, store: &JsonStore, file: &str) -> Result<()> {
        store.save(file, self)?;
        debug!(
            "[registry] snapshot saved: {} services -> {}",
            self.len(),
            store.file_path(file).display()
        );
        Ok(())
    }

    /// `Ok(None)` when no snapshot exists; `Err` when it is unreadable
    pub fn load(store: &JsonStore, file: &str) -> Result<Option<Self>> {
        store.load_optional(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let snapshot = RegistrySnapshot::new(vec![
            ServiceDescriptor::new("b", "second").with_capability("x"),
            ServiceDescriptor::new("a", "first").with_capability("x"),
        ]);
        snapshot.save(&store, DEFAULT_SNAPSHOT_FILE).unwrap();

        let loaded = RegistrySnapshot::load(&store, DEFAULT_SNAPSHOT_FILE)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.service_names(), vec!["b", "a"]);
    }

    #[test]
    fn test_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(RegistrySnapshot::load(&store, "none.json").unwrap().is_none());

        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        assert!(RegistrySnapshot::load(&store, "bad.json").is_err());
    }
}
