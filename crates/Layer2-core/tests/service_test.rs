//! ServiceManager integration tests: snapshot 복원, built-in 서비스, 동시 실행

use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use warden_core::registry::{RegistryEvent, RegistrySnapshot, ServiceDescriptor};
use warden_core::service::builtin::BUILTIN_NAMES;
use warden_core::{CommandGate, MetadataValue, ServiceManager};
use warden_foundation::{Error, JsonStore, WardenConfig};

const SNAPSHOT_FILE: &str = "registry.json";

fn manager_with_store(root: &Path, store: &Path) -> ServiceManager {
    ServiceManager::builder()
        .workspace_root(root)
        .snapshot_store(JsonStore::new(store))
        .build()
        .unwrap()
}

fn read_snapshot(store: &Path) -> RegistrySnapshot {
    JsonStore::new(store).load(SNAPSHOT_FILE).unwrap()
}

// ============================================================================
// Snapshot start-up
// ============================================================================

#[test]
fn test_missing_snapshot_is_created() {
    let root = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();

    let manager = manager_with_store(root.path(), store.path());

    assert_eq!(manager.snapshot_path(), Some(store.path().join(SNAPSHOT_FILE)));
    let snapshot = read_snapshot(store.path());
    assert_eq!(snapshot.service_names(), BUILTIN_NAMES);
}

#[test]
fn test_corrupt_snapshot_is_rebuilt() {
    let root = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    std::fs::write(store.path().join(SNAPSHOT_FILE), "{ not json").unwrap();

    let manager = manager_with_store(root.path(), store.path());

    assert_eq!(manager.list_services().len(), BUILTIN_NAMES.len());
    assert_eq!(read_snapshot(store.path()).len(), BUILTIN_NAMES.len());
}

#[test]
fn test_unwritable_snapshot_store_does_not_block_startup() {
    let root = tempfile::tempdir().unwrap();
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let store = blocker.path().join("store");

    let manager = ServiceManager::builder()
        .workspace_root(root.path())
        .snapshot_store(JsonStore::new(&store))
        .build()
        .expect("snapshot write failure must not abort start-up");

    let names: Vec<String> = manager.list_services().into_iter().map(|d| d.name).collect();
    assert_eq!(names, BUILTIN_NAMES);
    assert!(!store.exists());
    assert!(matches!(manager.save_snapshot(), Err(Error::Storage(_))));
}

#[test]
fn test_custom_service_survives_restart() {
    let root = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();

    {
        let manager = manager_with_store(root.path(), store.path());
        let mut metadata = BTreeMap::new();
        metadata.insert("owner".to_string(), MetadataValue::from("ops"));
        manager
            .register_custom_service(
                "weather",
                "Forecasts",
                vec!["forecast".to_string(), "read".to_string()],
                metadata,
            )
            .unwrap();
        manager.save_snapshot().unwrap();
    }

    let manager = manager_with_store(root.path(), store.path());
    let weather = manager.get_service("weather").unwrap();
    assert_eq!(weather.description, "Forecasts");
    assert_eq!(weather.kind(), Some("custom"));
    assert_eq!(
        weather.metadata.get("owner").and_then(MetadataValue::as_str),
        Some("ops")
    );
    assert!(!manager.has_handler("weather"));

    // restored after the built-ins, so it is the newest "read" provider
    assert_eq!(manager.resolve_capability("read").unwrap().name, "weather");
}

#[test]
fn test_builtins_override_stale_snapshot() {
    let root = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    let stale = RegistrySnapshot::new(vec![ServiceDescriptor::new(
        "file_reader",
        "outdated description",
    )
    .with_capability("legacy")]);
    stale.save(&JsonStore::new(store.path()), SNAPSHOT_FILE).unwrap();

    let manager = manager_with_store(root.path(), store.path());

    let reader = manager.get_service("file_reader").unwrap();
    assert_ne!(reader.description, "outdated description");
    assert!(reader.has_capability("read"));
    assert!(!reader.has_capability("legacy"));
    assert!(manager.get_services_by_capability("legacy").is_empty());
    assert!(manager.has_handler("file_reader"));
}

#[test]
fn test_persist_on_change() {
    let root = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    let mut config = WardenConfig::default();
    config.registry.persist_on_change = true;

    let manager = ServiceManager::builder()
        .config(config)
        .workspace_root(root.path())
        .snapshot_store(JsonStore::new(store.path()))
        .build()
        .unwrap();

    manager
        .register_custom_service("notes", "Note taking", vec!["write".into()], BTreeMap::new())
        .unwrap();
    assert!(read_snapshot(store.path()).service_names().contains(&"notes"));

    manager.deregister("notes").unwrap();
    assert!(!read_snapshot(store.path()).service_names().contains(&"notes"));
}

// ============================================================================
// Invocation
// ============================================================================

#[tokio::test]
async fn test_invoke_unknown_service() {
    let root = tempfile::tempdir().unwrap();
    let manager = ServiceManager::builder().workspace_root(root.path()).build().unwrap();

    assert!(matches!(
        manager.invoke("teleporter", json!({})).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        manager.invoke_capability("teleport", json!({})).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_file_round_trip_through_manager() {
    let root = tempfile::tempdir().unwrap();
    let manager = ServiceManager::builder().workspace_root(root.path()).build().unwrap();

    let written = manager
        .invoke(
            "file_writer",
            json!({"path": "docs/notes.md", "content": "hello warden\n"}),
        )
        .await
        .unwrap();
    assert!(written.success);

    let read = manager
        .invoke_capability("read", json!({"path": "docs/notes.md"}))
        .await
        .unwrap();
    assert_eq!(read.service, "file_reader");
    assert_eq!(read.data["content"], "hello warden\n");

    let listing = manager
        .invoke("directory_lister", json!({"path": "docs"}))
        .await
        .unwrap();
    let entries = listing.data["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "notes.md");

    assert!(matches!(
        manager
            .invoke("file_reader", json!({"path": "docs/missing.md"}))
            .await,
        Err(Error::NotFound(_))
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_service_goes_through_gate() {
    let root = tempfile::tempdir().unwrap();
    let manager = ServiceManager::builder().workspace_root(root.path()).build().unwrap();

    let out = manager
        .invoke("shell_executor", json!({"command": "echo via-gate"}))
        .await
        .unwrap();
    assert!(out.success);
    assert_eq!(out.data["status"], "EXECUTED");
    assert_eq!(out.data["stdout"].as_str().unwrap().trim(), "via-gate");

    let refused = manager
        .invoke("shell_executor", json!({"command": "rm -rf /"}))
        .await;
    assert!(matches!(refused, Err(Error::Refused(_))));

    // the record is kept by the shared gate
    let history = manager.gate().history(10);
    assert_eq!(history.len(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_confirmation_flow() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("target")).unwrap();
    let manager = ServiceManager::builder().workspace_root(root.path()).build().unwrap();

    let held = manager
        .invoke("shell_executor", json!({"command": "rm -rf target"}))
        .await
        .unwrap();
    assert_eq!(held.data["status"], "AWAITING_CONFIRMATION");
    assert!(root.path().join("target").exists());

    let id = held.data["id"].as_str().unwrap().to_string();
    let token = held.data["confirmationToken"].as_str().unwrap().to_string();
    let done = manager
        .invoke(
            "shell_executor",
            json!({"action": "confirm", "executionId": id, "token": token}),
        )
        .await
        .unwrap();
    assert_eq!(done.data["status"], "EXECUTED");
    assert!(!root.path().join("target").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_concurrent_invocations() {
    let root = tempfile::tempdir().unwrap();
    let gate = Arc::new(CommandGate::new());
    let manager = Arc::new(
        ServiceManager::builder()
            .workspace_root(root.path())
            .gate(gate.clone())
            .build()
            .unwrap(),
    );

    let calls = (0..6).map(|i| {
        let manager = manager.clone();
        async move {
            manager
                .invoke("shell_executor", json!({"command": format!("echo job-{}", i)}))
                .await
        }
    });
    let outputs = futures::future::join_all(calls).await;

    for (i, output) in outputs.into_iter().enumerate() {
        let output = output.unwrap();
        assert_eq!(output.data["stdout"].as_str().unwrap().trim(), format!("job-{}", i));
    }
    assert_eq!(gate.history(100).len(), 6);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_registry_events() {
    let root = tempfile::tempdir().unwrap();
    let manager = ServiceManager::builder()
        .workspace_root(root.path())
        .without_builtins()
        .build()
        .unwrap();
    let mut events = manager.subscribe();

    manager
        .register_custom_service("a", "first", vec!["x".into()], BTreeMap::new())
        .unwrap();
    manager
        .register_custom_service("a", "second", vec!["y".into()], BTreeMap::new())
        .unwrap();
    manager.deregister("a").unwrap();

    assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Registered { .. }));
    assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Replaced { .. }));
    match events.recv().await.unwrap() {
        RegistryEvent::Unregistered { name } => assert_eq!(name, "a"),
        other => panic!("unexpected event {:?}", other),
    }
}
