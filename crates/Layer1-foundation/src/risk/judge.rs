//! Semantic Judge - 외부 판정자 인터페이스
//!
//! 구현체는 두 가지:
//! - `DisabledJudge`: 항상 사용 불가 (judge 없이 pattern-only 로 동작)
//! - 네트워크 어댑터 (`warden-judge` crate)
//!
//! 생성 시점에 선택되며, 실패는 `JudgeError` 로 반환되어 fusion 단계에서 흡수된다.

use super::types::RiskVerdict;
use crate::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================
// JudgeError
// ============================================================

/// Judge 호출 실패 (모두 "사용 불가"로 취급)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgeError {
    #[error("Semantic judge is disabled")]
    Disabled,

    #[error("Semantic judge not configured: {0}")]
    NotConfigured(String),

    #[error("Semantic judge timed out after {0}ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<JudgeError> for Error {
    fn from(err: JudgeError) -> Self {
        Error::Unavailable(err.to_string())
    }
}

// ============================================================
// JudgeContext
// ============================================================

/// 판정 요청에 함께 보내는 맥락 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// 최근 실행한 명령 (오래된 것부터)
    #[serde(default)]
    pub recent_commands: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    pub os: String,

    /// 추가 필드
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl JudgeContext {
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            user: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .ok(),
            ..Default::default()
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_recent_commands(mut self, commands: Vec<String>) -> Self {
        self.recent_commands = commands;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

// ============================================================
// SemanticJudge trait
// ============================================================

/// 명령어를 독립적으로 평가하는 외부 판정자
#[async_trait]
pub trait SemanticJudge: Send + Sync {
    /// 로그용 이름
    fn name(&self) -> &str;

    /// 실제로 호출 가능한 구현인지
    fn is_enabled(&self) -> bool {
        true
    }

    /// 명령어 판정 (source = judge-only)
    async fn judge(&self, command: &str, context: &JudgeContext)
        -> Result<RiskVerdict, JudgeError>;
}

/// 비활성 judge - 항상 `JudgeError::Disabled`
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledJudge;

#[async_trait]
impl SemanticJudge for DisabledJudge {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn judge(
        &self,
        _command: &str,
        _context: &JudgeContext,
    ) -> Result<RiskVerdict, JudgeError> {
        Err(JudgeError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_judge_is_unavailable() {
        let judge = DisabledJudge;
        let result = judge.judge("ls", &JudgeContext::new()).await;
        assert_eq!(result, Err(JudgeError::Disabled));
        assert!(!judge.is_enabled());

        let err: Error = JudgeError::Disabled.into();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[test]
    fn test_context_serializes_as_mapping() {
        let ctx = JudgeContext::new()
            .with_working_dir("/work")
            .with_recent_commands(vec!["ls".into(), "git status".into()])
            .with_extra("session", Value::from("abc"));

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["working_dir"], "/work");
        assert_eq!(json["recent_commands"][1], "git status");
        assert_eq!(json["session"], "abc");
        assert!(json["os"].is_string());
    }
}
