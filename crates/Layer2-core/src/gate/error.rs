//! Error types for the execution gate
//!
//! GateError는 명령 실행 게이트의 세부 에러를 관리합니다.
//! warden_foundation::Error와의 변환을 지원합니다.

use std::io;
use thiserror::Error;
use warden_foundation::Error as FoundationError;

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors that can occur in the execution gate
#[derive(Error, Debug)]
pub enum GateError {
    /// Nothing to run
    #[error("Empty command")]
    EmptyCommand,

    /// Command never ran (blocked, denied or expired)
    #[error("Command refused: {reason}")]
    Refused { command: String, reason: String },

    /// Command exceeded its wall-clock bound and was killed
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout {
        timeout_ms: u64,
        partial_output: Option<String>,
    },

    /// Caller cancelled the running command
    #[error("Command cancelled")]
    Cancelled,

    /// Pending confirmation was not answered in time
    #[error("Confirmation expired for execution {0}")]
    ConfirmationExpired(String),

    /// No execution with this id
    #[error("Unknown execution: {0}")]
    UnknownExecution(String),

    /// Execution exists but is no longer awaiting confirmation
    #[error("Execution {0} is not awaiting confirmation")]
    AlreadyResolved(String),

    /// Confirmation token did not match
    #[error("Invalid confirmation token for execution {0}")]
    InvalidToken(String),

    /// Failed to spawn the shell process
    #[error("Failed to spawn shell: {0}")]
    SpawnFailed(String),

    /// Working directory error
    #[error("Working directory error: {0}")]
    WorkingDirectory(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl GateError {
    /// Check if this is a security-related error
    pub fn is_security_error(&self) -> bool {
        matches!(
            self,
            Self::Refused { .. } | Self::ConfirmationExpired(_) | Self::InvalidToken(_)
        )
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Refused { command, reason } => {
                format!("Command '{}' was refused: {}", command, reason)
            }
            Self::ConfirmationExpired(id) => {
                format!("Confirmation for {} expired; submit the command again", id)
            }
            Self::Timeout { timeout_ms, .. } => {
                format!("Command timed out after {:.1} seconds", *timeout_ms as f64 / 1000.0)
            }
            _ => self.to_string(),
        }
    }
}

// ============================================================================
// warden_foundation::Error 변환
// ============================================================================

impl From<GateError> for FoundationError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::EmptyCommand => FoundationError::InvalidInput("Empty command".to_string()),
            GateError::Refused { reason, .. } => FoundationError::Refused(reason),
            GateError::Timeout {
                timeout_ms,
                partial_output,
            } => FoundationError::Timeout {
                message: format!("Command timed out after {}ms", timeout_ms),
                partial_output,
            },
            GateError::Cancelled => FoundationError::Cancelled,
            GateError::ConfirmationExpired(id) => FoundationError::ConfirmationExpired(id),
            GateError::UnknownExecution(id) => {
                FoundationError::NotFound(format!("execution {}", id))
            }
            err @ (GateError::AlreadyResolved(_) | GateError::InvalidToken(_)) => {
                FoundationError::InvalidInput(err.to_string())
            }
            GateError::SpawnFailed(msg) => FoundationError::service("shell_executor", msg),
            GateError::WorkingDirectory(msg) => FoundationError::InvalidInput(msg),
            GateError::Io(e) => FoundationError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_errors_surface_verbatim() {
        let err: FoundationError = GateError::Refused {
            command: "rm -rf /".into(),
            reason: "Deletes the root or home directory".into(),
        }
        .into();
        assert!(matches!(err, FoundationError::Refused(ref r) if r.contains("root")));

        let err: FoundationError = GateError::Timeout {
            timeout_ms: 500,
            partial_output: Some("tick".into()),
        }
        .into();
        match err {
            FoundationError::Timeout { partial_output, .. } => {
                assert_eq!(partial_output.as_deref(), Some("tick"))
            }
            other => panic!("unexpected: {:?}", other),
        }

        let err: FoundationError = GateError::UnknownExecution("abc".into()).into();
        assert!(matches!(err, FoundationError::NotFound(_)));
    }

    #[test]
    fn test_security_errors() {
        assert!(GateError::ConfirmationExpired("x".into()).is_security_error());
        assert!(!GateError::Cancelled.is_security_error());
        assert_eq!(
            GateError::Timeout {
                timeout_ms: 1500,
                partial_output: None
            }
            .user_message(),
            "Command timed out after 1.5 seconds"
        );
    }
}
