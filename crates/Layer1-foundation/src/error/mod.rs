//! Error types for Warden
//!
//! 모든 에러를 중앙에서 관리
//!
//! 분류 계층(judge) 에러는 호출자에게 도달하기 전에 흡수되고,
//! 실행 계층(refusal, timeout) 에러는 그대로 노출된다.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Warden 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 조회 관련
    // ========================================================================
    /// 알 수 없는 서비스 / capability
    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // 분류 관련
    // ========================================================================
    /// Semantic judge 연결 불가 (fusion 단계에서 pattern-only로 흡수됨)
    #[error("Unavailable: {0}")]
    Unavailable(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    /// BLOCKED 명령 또는 거부된 확인 요청
    #[error("Refused: {0}")]
    Refused(String),

    /// 서브프로세스 또는 judge 호출 시간 초과
    #[error("Timeout: {message}")]
    Timeout {
        message: String,
        partial_output: Option<String>,
    },

    /// 확인 대기 중인 명령의 만료
    #[error("Confirmation expired: {0}")]
    ConfirmationExpired(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 서비스 관련
    // ========================================================================
    #[error("Service error: {service} - {message}")]
    Service { service: String, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Too large: {0}")]
    TooLarge(String),

    // ========================================================================
    // 저장소 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    ///
    /// Refused / ConfirmationExpired 는 자동 재시도하지 않는다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Http(_))
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::Refused(_)
                | Error::Timeout { .. }
                | Error::ConfirmationExpired(_)
                | Error::Cancelled
                | Error::PermissionDenied(_)
                | Error::TooLarge(_)
                | Error::InvalidInput(_)
        )
    }

    /// Timeout 에러 생성 헬퍼
    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
            partial_output: None,
        }
    }

    /// 서비스 에러 생성 헬퍼
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Service {
            service: service.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
