//! Execution records produced by the gate
//!
//! Every submitted command yields exactly one record. Records are replaced
//! (never mutated in place) when a pending confirmation resolves.

use super::error::GateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_foundation::RiskVerdict;

/// Gate state machine steps, in the order they were visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Received,
    Classified,
    AwaitingConfirmation,
    Confirmed,
    Denied,
    Executed,
    Refused,
    Failed,
    TimedOut,
    Cancelled,
}

/// Final (or waiting) status of a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Ran and exited with status 0
    Executed,
    /// Never ran
    Refused,
    /// Waiting for an explicit confirm/deny
    AwaitingConfirmation,
    /// Ran and exited non-zero, or could not be spawned
    Failed,
    /// Killed after exceeding its timeout
    TimedOut,
    /// Killed after the caller cancelled it
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::AwaitingConfirmation)
    }

    /// Whether a process was started for this record
    pub fn did_run(&self) -> bool {
        matches!(
            self,
            Self::Executed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "EXECUTED",
            Self::Refused => "REFUSED",
            Self::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a command never ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalKind {
    /// Verdict was BLOCKED
    Blocked,
    /// Caller denied the pending confirmation
    Denied,
    /// Confirmation window elapsed
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refusal {
    pub kind: RefusalKind,
    pub reason: String,
}

/// A single command execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Unique identifier (also the confirmation handle)
    pub id: String,

    /// The command exactly as submitted
    pub command: String,

    /// Working directory, if the caller supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Fused verdict that drove the decision
    pub verdict: RiskVerdict,

    pub status: ExecutionStatus,

    /// Shown for CAUTION and CRITICAL verdicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<Refusal>,

    /// Only while AWAITING_CONFIRMATION
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Populated for EXECUTED and FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Output captured before a timeout or cancellation killed the process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_output: Option<String>,

    /// Effective timeout in milliseconds, for processes that ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// States visited, RECEIVED first
    pub trace: Vec<GateState>,
}

impl ExecutionRecord {
    pub(crate) fn new(
        id: String,
        command: String,
        working_dir: Option<String>,
        verdict: RiskVerdict,
        status: ExecutionStatus,
        started_at: DateTime<Utc>,
        trace: Vec<GateState>,
    ) -> Self {
        Self {
            id,
            command,
            working_dir,
            verdict,
            status,
            warning: None,
            refusal: None,
            confirmation_token: None,
            expires_at: None,
            exit_code: None,
            stdout: None,
            stderr: None,
            partial_output: None,
            timeout_ms: None,
            started_at,
            finished_at: None,
            duration_ms: None,
            trace,
        }
    }

    /// Stamp completion time and duration
    pub(crate) fn finish(&mut self) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Executed
    }

    /// stdout followed by stderr
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.as_deref().unwrap_or("");
        let stderr = self.stderr.as_deref().unwrap_or("");
        if stderr.is_empty() {
            stdout.to_string()
        } else if stdout.is_empty() {
            stderr.to_string()
        } else {
            format!("{}\n{}", stdout, stderr)
        }
    }

    /// Map refusals, timeouts and cancellations to typed errors.
    ///
    /// EXECUTED, FAILED and AWAITING_CONFIRMATION stay `Ok`: the caller
    /// inspects the exit code or answers the confirmation.
    pub fn into_result(self) -> Result<ExecutionRecord, GateError> {
        match self.status {
            ExecutionStatus::Refused => {
                let refusal = self.refusal.clone();
                match refusal {
                    Some(Refusal {
                        kind: RefusalKind::Expired,
                        ..
                    }) => Err(GateError::ConfirmationExpired(self.id)),
                    Some(Refusal { reason, .. }) => Err(GateError::Refused {
                        command: self.command,
                        reason,
                    }),
                    None => Err(GateError::Refused {
                        command: self.command,
                        reason: self.verdict.summary(),
                    }),
                }
            }
            ExecutionStatus::TimedOut => Err(GateError::Timeout {
                timeout_ms: self.timeout_ms.unwrap_or_default(),
                partial_output: self.partial_output,
            }),
            ExecutionStatus::Cancelled => Err(GateError::Cancelled),
            _ => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_foundation::{RiskLevel, VerdictSource};

    fn record(status: ExecutionStatus) -> ExecutionRecord {
        ExecutionRecord::new(
            "exec-1".into(),
            "echo hi".into(),
            None,
            RiskVerdict::new(RiskLevel::Blocked, 100, vec!["Fork bomb".into()], VerdictSource::PatternOnly),
            status,
            Utc::now(),
            vec![GateState::Received, GateState::Classified],
        )
    }

    #[test]
    fn test_status_helpers() {
        assert!(!ExecutionStatus::AwaitingConfirmation.is_terminal());
        assert!(ExecutionStatus::Refused.is_terminal());
        assert!(!ExecutionStatus::Refused.did_run());
        assert!(ExecutionStatus::TimedOut.did_run());
        assert_eq!(
            serde_json::to_value(ExecutionStatus::TimedOut).unwrap(),
            "TIMED_OUT"
        );
    }

    #[test]
    fn test_into_result() {
        let mut refused = record(ExecutionStatus::Refused);
        refused.refusal = Some(Refusal {
            kind: RefusalKind::Blocked,
            reason: "Fork bomb".into(),
        });
        assert!(matches!(
            refused.into_result(),
            Err(GateError::Refused { reason, .. }) if reason == "Fork bomb"
        ));

        let mut expired = record(ExecutionStatus::Refused);
        expired.refusal = Some(Refusal {
            kind: RefusalKind::Expired,
            reason: "Confirmation expired".into(),
        });
        assert!(matches!(
            expired.into_result(),
            Err(GateError::ConfirmationExpired(id)) if id == "exec-1"
        ));

        let mut timed_out = record(ExecutionStatus::TimedOut);
        timed_out.timeout_ms = Some(250);
        timed_out.partial_output = Some("tick\n".into());
        match timed_out.into_result() {
            Err(GateError::Timeout {
                timeout_ms,
                partial_output,
            }) => {
                assert_eq!(timeout_ms, 250);
                assert_eq!(partial_output.as_deref(), Some("tick\n"));
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert!(record(ExecutionStatus::Failed).into_result().is_ok());
    }

    #[test]
    fn test_combined_output() {
        let mut rec = record(ExecutionStatus::Executed);
        rec.stdout = Some("out".into());
        rec.stderr = Some("err".into());
        assert_eq!(rec.combined_output(), "out\nerr");
        rec.stdout = None;
        assert_eq!(rec.combined_output(), "err");
    }
}
