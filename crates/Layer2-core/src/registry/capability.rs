//! Capability Registry - 이름/capability 인덱스를 가진 서비스 레지스트리
//!
//! 모든 인덱스(이름, 등록 순서, capability)는 하나의 RwLock 아래에 있어
//! 동시 조회 중에도 서로 어긋난 상태가 보이지 않는다.
//! 이벤트는 lock을 놓은 뒤 발행한다.

use super::descriptor::ServiceDescriptor;
use super::event::RegistryEvent;
use super::snapshot::RegistrySnapshot;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;
use tracing::debug;
use warden_foundation::{Error, Result};

/// Whether `register` added a name or overwrote one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Inserted,
    Replaced,
}

struct Slot {
    /// Registration order key; kept across replacement
    seq: u64,
    descriptor: ServiceDescriptor,
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<String, Slot>,
    /// capability -> (seq -> name)
    by_capability: HashMap<String, BTreeMap<u64, String>>,
    next_seq: u64,
}

impl RegistryState {
    fn index(&mut self, seq: u64, descriptor: &ServiceDescriptor) {
        for tag in &descriptor.capabilities {
            self.by_capability
                .entry(tag.clone())
                .or_default()
                .insert(seq, descriptor.name.clone());
        }
    }

    fn unindex(&mut self, seq: u64, descriptor: &ServiceDescriptor) {
        for tag in &descriptor.capabilities {
            if let Some(names) = self.by_capability.get_mut(tag) {
                names.remove(&seq);
                if names.is_empty() {
                    self.by_capability.remove(tag);
                }
            }
        }
    }

    fn ordered(&self) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self.slots.values().collect();
        slots.sort_by_key(|s| s.seq);
        slots
    }
}

// ============================================================================
// CapabilityRegistry
// ============================================================================

pub struct CapabilityRegistry {
    state: RwLock<RegistryState>,
    event_tx: broadcast::Sender<RegistryEvent>,
    /// 레지스트리 이름 (디버깅용)
    name: String,
}

impl CapabilityRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            state: RwLock::new(RegistryState::default()),
            event_tx,
            name: name.into(),
        }
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// Insert or overwrite by name. A replaced entry keeps its position and
    /// its old capability tags stop resolving to it.
    pub fn register(&self, descriptor: ServiceDescriptor) -> Result<RegisterOutcome> {
        let descriptor = descriptor.normalized();
        if descriptor.name.is_empty() {
            return Err(Error::InvalidInput("Service name is empty".to_string()));
        }
        let name = descriptor.name.clone();
        let capabilities = descriptor.capabilities.clone();

        let outcome = {
            let mut state = self.state.write();
            match state.slots.remove(&name) {
                Some(old) => {
                    state.unindex(old.seq, &old.descriptor);
                    state.index(old.seq, &descriptor);
                    state.slots.insert(
                        name.clone(),
                        Slot {
                            seq: old.seq,
                            descriptor,
                        },
                    );
                    RegisterOutcome::Replaced
                }
                None => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.index(seq, &descriptor);
                    state.slots.insert(name.clone(), Slot { seq, descriptor });
                    RegisterOutcome::Inserted
                }
            }
        };

        debug!("[{}] {:?}: {} {:?}", self.name, outcome, name, capabilities);
        let event = match outcome {
            RegisterOutcome::Inserted => RegistryEvent::Registered { name, capabilities },
            RegisterOutcome::Replaced => RegistryEvent::Replaced { name, capabilities },
        };
        self.emit_event(event);
        Ok(outcome)
    }

    /// Remove by name; `None` if it was not registered
    pub fn deregister(&self, name: &str) -> Option<ServiceDescriptor> {
        let removed = {
            let mut state = self.state.write();
            let slot = state.slots.remove(name)?;
            state.unindex(slot.seq, &slot.descriptor);
            slot.descriptor
        };

        debug!("[{}] Unregistered: {}", self.name, name);
        self.emit_event(RegistryEvent::Unregistered {
            name: name.to_string(),
        });
        Some(removed)
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn lookup_by_name(&self, name: &str) -> Result<ServiceDescriptor> {
        self.get(name)
            .ok_or_else(|| Error::NotFound(format!("service '{}'", name)))
    }

    pub fn get(&self, name: &str) -> Option<ServiceDescriptor> {
        self.state
            .read()
            .slots
            .get(name)
            .map(|s| s.descriptor.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().slots.contains_key(name)
    }

    /// Providers of a capability, oldest registration first
    pub fn lookup_by_capability(&self, tag: &str) -> Vec<ServiceDescriptor> {
        let state = self.state.read();
        state
            .by_capability
            .get(tag)
            .map(|names| {
                names
                    .values()
                    .filter_map(|name| state.slots.get(name))
                    .map(|s| s.descriptor.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All descriptors in registration order
    pub fn list_all(&self) -> Vec<ServiceDescriptor> {
        self.state
            .read()
            .ordered()
            .into_iter()
            .map(|s| s.descriptor.clone())
            .collect()
    }

    /// Known capability tags, sorted
    pub fn capabilities(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.state.read().by_capability.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.state.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().slots.is_empty()
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.list_all())
    }

    /// Register every descriptor of a snapshot, in order
    pub fn restore(&self, snapshot: RegistrySnapshot) -> usize {
        let mut restored = 0;
        for descriptor in snapshot.services {
            let name = descriptor.name.clone();
            match self.register(descriptor) {
                Ok(_) => restored += 1,
                Err(e) => debug!("[{}] skipped snapshot entry '{}': {}", self.name, name, e),
            }
        }
        self.emit_event(RegistryEvent::Restored { count: restored });
        restored
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: RegistryEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Every index agrees with the name map (checked under one read lock)
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let state = self.state.read();
        let forward = state.slots.values().all(|slot| {
            slot.descriptor.capabilities.iter().all(|tag| {
                state
                    .by_capability
                    .get(tag)
                    .and_then(|names| names.get(&slot.seq))
                    == Some(&slot.descriptor.name)
            })
        });
        let backward = state.by_capability.iter().all(|(tag, names)| {
            names.iter().all(|(seq, name)| {
                state
                    .slots
                    .get(name)
                    .is_some_and(|s| s.seq == *seq && s.descriptor.has_capability(tag))
            })
        });
        forward && backward
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new("registry")
    }
}
