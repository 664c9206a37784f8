//! Service Manager - 레지스트리 + handler 바인딩 + 실행 게이트
//!
//! 시작 시:
//! 1. 스냅샷이 있으면 descriptor를 캐시로 복원 (handler 없음)
//! 2. built-in 서비스를 항상 다시 등록 (built-in handler가 우선)
//! 3. 스냅샷이 없거나 손상되었으면 새로 저장

use super::builtin::builtin_services;
use super::traits::{Service, ServiceOutput};
use crate::gate::CommandGate;
use crate::registry::{
    CapabilityRegistry, MetadataValue, RegisterOutcome, RegistryEvent, RegistrySnapshot,
    ServiceDescriptor, DEFAULT_SNAPSHOT_FILE,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use warden_foundation::{Error, JsonStore, Result, SemanticJudge, WardenConfig};

/// Where the registry snapshot lives
#[derive(Debug, Clone)]
struct SnapshotTarget {
    store: JsonStore,
    file: String,
}

// ============================================================================
// ServiceManager
// ============================================================================

pub struct ServiceManager {
    registry: CapabilityRegistry,
    handlers: RwLock<HashMap<String, Arc<dyn Service>>>,
    gate: Arc<CommandGate>,
    snapshot: Option<SnapshotTarget>,
    persist_on_change: bool,
}

impl ServiceManager {
    pub fn builder() -> ServiceManagerBuilder {
        ServiceManagerBuilder::new()
    }

    pub fn gate(&self) -> &Arc<CommandGate> {
        &self.gate
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.subscribe()
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// Register a descriptor-only service. Any handler previously bound to
    /// the name is dropped, so invoking it fails until a handler is bound.
    pub fn register_custom_service(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        capabilities: Vec<String>,
        metadata: BTreeMap<String, MetadataValue>,
    ) -> Result<RegisterOutcome> {
        let mut descriptor =
            ServiceDescriptor::new(name, description).with_capabilities(capabilities);
        descriptor.metadata = metadata;
        descriptor
            .metadata
            .entry("type".to_string())
            .or_insert_with(|| MetadataValue::from("custom"));

        let name = descriptor.name.trim().to_string();
        // handler 맵과 레지스트리는 handlers 락 아래에서 함께 바뀐다
        let outcome = {
            let mut handlers = self.handlers.write();
            let outcome = self.registry.register(descriptor)?;
            handlers.remove(&name);
            outcome
        };
        info!("[services] {:?} custom service '{}'", outcome, name);

        self.persist_if_enabled();
        Ok(outcome)
    }

    /// Register a service together with its handler
    pub fn register_service(&self, service: Arc<dyn Service>) -> Result<RegisterOutcome> {
        let outcome = self.bind(service)?;
        self.persist_if_enabled();
        Ok(outcome)
    }

    fn bind(&self, service: Arc<dyn Service>) -> Result<RegisterOutcome> {
        let descriptor = service.descriptor();
        let name = descriptor.name.clone();
        if name != service.name() {
            return Err(Error::InvalidInput(format!(
                "descriptor name '{}' does not match service '{}'",
                name,
                service.name()
            )));
        }
        let outcome = {
            let mut handlers = self.handlers.write();
            let outcome = self.registry.register(descriptor)?;
            handlers.insert(name.clone(), service);
            outcome
        };
        debug!("[services] {:?} service '{}'", outcome, name);
        Ok(outcome)
    }

    pub fn deregister(&self, name: &str) -> Result<ServiceDescriptor> {
        let removed = {
            let mut handlers = self.handlers.write();
            let removed = self
                .registry
                .deregister(name)
                .ok_or_else(|| Error::NotFound(format!("service '{}'", name)))?;
            handlers.remove(name);
            removed
        };
        info!("[services] deregistered '{}'", name);

        self.persist_if_enabled();
        Ok(removed)
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn get_service(&self, name: &str) -> Result<ServiceDescriptor> {
        self.registry.lookup_by_name(name)
    }

    /// Providers of a capability, oldest registration first
    pub fn get_services_by_capability(&self, tag: &str) -> Vec<ServiceDescriptor> {
        self.registry.lookup_by_capability(tag)
    }

    /// The most recently registered provider of a capability
    pub fn resolve_capability(&self, tag: &str) -> Result<ServiceDescriptor> {
        self.registry
            .lookup_by_capability(tag)
            .pop()
            .ok_or_else(|| Error::NotFound(format!("no service provides capability '{}'", tag)))
    }

    pub fn list_services(&self) -> Vec<ServiceDescriptor> {
        self.registry.list_all()
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    // ========================================================================
    // 실행
    // ========================================================================

    pub async fn invoke(&self, name: &str, args: Value) -> Result<ServiceOutput> {
        let handler = {
            let handlers = self.handlers.read();
            self.registry.lookup_by_name(name)?;
            handlers.get(name).cloned()
        };
        let handler = handler.ok_or_else(|| {
            Error::service(name, "no handler bound (descriptor-only service)")
        })?;

        debug!("[services] invoke '{}'", name);
        handler.invoke(args).await
    }

    pub async fn invoke_capability(&self, tag: &str, args: Value) -> Result<ServiceOutput> {
        let descriptor = self.resolve_capability(tag)?;
        self.invoke(&descriptor.name, args).await
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Write the current registry to the snapshot file
    pub fn save_snapshot(&self) -> Result<()> {
        let target = self
            .snapshot
            .as_ref()
            .ok_or_else(|| Error::Config("no snapshot store configured".to_string()))?;
        self.registry.snapshot().save(&target.store, &target.file)
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot
            .as_ref()
            .map(|t| t.store.file_path(&t.file))
    }

    fn persist_if_enabled(&self) {
        if !self.persist_on_change || self.snapshot.is_none() {
            return;
        }
        if let Err(e) = self.save_snapshot() {
            warn!("[services] failed to persist registry snapshot: {}", e);
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct ServiceManagerBuilder {
    config: WardenConfig,
    gate: Option<Arc<CommandGate>>,
    judge: Option<Arc<dyn SemanticJudge>>,
    snapshot_store: Option<JsonStore>,
    workspace_root: Option<PathBuf>,
    builtins: bool,
}

impl ServiceManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: WardenConfig::default(),
            gate: None,
            judge: None,
            snapshot_store: None,
            workspace_root: None,
            builtins: true,
        }
    }

    pub fn config(mut self, config: WardenConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing gate instead of building one from the config
    pub fn gate(mut self, gate: Arc<CommandGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Judge for the gate built from the config
    pub fn judge(mut self, judge: Arc<dyn SemanticJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn snapshot_store(mut self, store: JsonStore) -> Self {
        self.snapshot_store = Some(store);
        self
    }

    /// Base directory for relative paths in built-in services
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Skip registering the built-in services
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    pub fn build(self) -> Result<ServiceManager> {
        let root = match self.workspace_root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };

        let gate = match self.gate {
            Some(gate) => gate,
            None => {
                let judge = self
                    .judge
                    .unwrap_or_else(|| crate::judge::judge_from_config(&self.config.judge));
                Arc::new(
                    CommandGate::builder()
                        .config(&self.config)
                        .judge(judge)
                        .build(),
                )
            }
        };

        let snapshot = self.snapshot_store.map(|store| SnapshotTarget {
            store,
            file: if self.config.registry.snapshot_file.is_empty() {
                DEFAULT_SNAPSHOT_FILE.to_string()
            } else {
                self.config.registry.snapshot_file.clone()
            },
        });

        let manager = ServiceManager {
            registry: CapabilityRegistry::new("services"),
            handlers: RwLock::new(HashMap::new()),
            gate: Arc::clone(&gate),
            snapshot,
            persist_on_change: self.config.registry.persist_on_change,
        };

        let needs_rebuild = match &manager.snapshot {
            Some(target) => match RegistrySnapshot::load(&target.store, &target.file) {
                Ok(Some(snapshot)) => {
                    let count = manager.registry.restore(snapshot);
                    info!("[services] restored {} services from snapshot", count);
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    warn!("[services] snapshot unreadable, rebuilding: {}", e);
                    true
                }
            },
            None => false,
        };

        if self.builtins {
            for service in builtin_services(gate, &root) {
                manager.bind(service)?;
            }
        }

        // 스냅샷 쓰기 실패는 시작을 막지 않는다
        if needs_rebuild || (manager.persist_on_change && manager.snapshot.is_some()) {
            if let Err(e) = manager.save_snapshot() {
                warn!("[services] could not write registry snapshot: {}", e);
            }
        }

        Ok(manager)
    }
}

impl Default for ServiceManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
