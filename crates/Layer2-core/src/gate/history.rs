//! In-memory execution history (ring buffer)

use super::record::{ExecutionRecord, ExecutionStatus};
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Default in-memory history size
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Bounded list of execution records, oldest first
pub struct ExecutionHistory {
    records: RwLock<VecDeque<ExecutionRecord>>,
    max_size: usize,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(max_size.min(DEFAULT_HISTORY_LIMIT))),
            max_size,
        }
    }

    /// Insert a record, replacing any earlier record with the same id
    pub fn upsert(&self, record: ExecutionRecord) {
        let mut records = self.records.write();
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record;
            return;
        }
        if records.len() >= self.max_size {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn get(&self, id: &str) -> Option<ExecutionRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.records.read().iter().rev().take(limit).cloned().collect()
    }

    /// Commands that actually ran, oldest first
    pub fn recent_commands(&self, limit: usize) -> Vec<String> {
        let records = self.records.read();
        let mut commands: Vec<String> = records
            .iter()
            .rev()
            .filter(|r| r.status.did_run())
            .take(limit)
            .map(|r| r.command.clone())
            .collect();
        commands.reverse();
        commands
    }

    pub fn count_by_status(&self, status: ExecutionStatus) -> usize {
        self.records.read().iter().filter(|r| r.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::record::GateState;
    use chrono::Utc;
    use warden_foundation::{RiskVerdict, VerdictSource};

    fn record(id: &str, command: &str, status: ExecutionStatus) -> ExecutionRecord {
        ExecutionRecord::new(
            id.into(),
            command.into(),
            None,
            RiskVerdict::safe(VerdictSource::PatternOnly),
            status,
            Utc::now(),
            vec![GateState::Received],
        )
    }

    #[test]
    fn test_ring_buffer_eviction() {
        let history = ExecutionHistory::with_max_size(2);
        history.upsert(record("a", "ls", ExecutionStatus::Executed));
        history.upsert(record("b", "pwd", ExecutionStatus::Executed));
        history.upsert(record("c", "date", ExecutionStatus::Executed));

        assert_eq!(history.len(), 2);
        assert!(history.get("a").is_none());
        let ids: Vec<_> = history.recent(10).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let history = ExecutionHistory::new();
        history.upsert(record("a", "rm -rf build", ExecutionStatus::AwaitingConfirmation));
        history.upsert(record("b", "ls", ExecutionStatus::Executed));
        history.upsert(record("a", "rm -rf build", ExecutionStatus::Refused));

        assert_eq!(history.len(), 2);
        assert_eq!(history.get("a").unwrap().status, ExecutionStatus::Refused);
        assert_eq!(history.count_by_status(ExecutionStatus::AwaitingConfirmation), 0);
    }

    #[test]
    fn test_recent_commands_skip_unrun() {
        let history = ExecutionHistory::new();
        history.upsert(record("a", "ls", ExecutionStatus::Executed));
        history.upsert(record("b", ":(){ :|:& };:", ExecutionStatus::Refused));
        history.upsert(record("c", "false", ExecutionStatus::Failed));

        assert_eq!(history.recent_commands(5), vec!["ls", "false"]);
        assert_eq!(history.recent_commands(1), vec!["false"]);
    }
}
