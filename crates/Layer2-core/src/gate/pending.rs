//! Pending confirmations
//!
//! DANGEROUS/CRITICAL 명령은 실행 전에 여기서 대기한다.
//! 만료 판정은 monotonic `Instant` 기준, 표시용 시각은 `DateTime<Utc>`.

use super::record::GateState;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use warden_foundation::RiskVerdict;

/// A command waiting for confirm/deny
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub execution_id: String,
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub verdict: RiskVerdict,
    pub warning: Option<String>,
    pub token: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub(crate) deadline: Instant,
    pub(crate) trace: Vec<GateState>,
}

impl PendingConfirmation {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Result of trying to claim a pending entry
#[derive(Debug)]
pub enum Claim {
    /// Entry removed and handed over
    Taken(Box<PendingConfirmation>),
    /// Entry was already past its deadline; removed
    Expired(Box<PendingConfirmation>),
    /// Token mismatch; entry left in place
    BadToken,
    /// No such pending entry
    Missing,
}

#[derive(Default)]
pub struct PendingStore {
    entries: Mutex<HashMap<String, PendingConfirmation>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: PendingConfirmation) {
        self.entries.lock().insert(entry.execution_id.clone(), entry);
    }

    /// Claim an entry if `token` matches (`None` skips the check)
    pub fn claim(&self, execution_id: &str, token: Option<&str>) -> Claim {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get(execution_id) else {
            return Claim::Missing;
        };

        if entry.is_expired_at(Instant::now()) {
            return match entries.remove(execution_id) {
                Some(entry) => Claim::Expired(Box::new(entry)),
                None => Claim::Missing,
            };
        }

        if let Some(token) = token {
            if entry.token != token {
                return Claim::BadToken;
            }
        }

        match entries.remove(execution_id) {
            Some(entry) => Claim::Taken(Box::new(entry)),
            None => Claim::Missing,
        }
    }

    /// Remove every entry past its deadline
    pub fn drain_expired(&self, now: Instant) -> Vec<PendingConfirmation> {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(id, _)| id.clone())
            .collect();

        let mut drained: Vec<PendingConfirmation> = expired
            .iter()
            .filter_map(|id| entries.remove(id))
            .collect();
        drained.sort_by_key(|e| e.deadline);
        drained
    }

    /// Snapshot of pending entries, soonest expiry first
    pub fn list(&self) -> Vec<PendingConfirmation> {
        let mut list: Vec<_> = self.entries.lock().values().cloned().collect();
        list.sort_by_key(|e| e.deadline);
        list
    }

    pub fn contains(&self, execution_id: &str) -> bool {
        self.entries.lock().contains_key(execution_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
