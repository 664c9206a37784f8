//! Judge 호출 에러 변환
//!
//! HTTP / reqwest 에러를 `JudgeError` 로 변환한다.
//! 어떤 에러든 fusion 단계에서는 "사용 불가"로 흡수된다.

use serde::Deserialize;
use std::time::Duration;
use warden_foundation::JudgeError;

/// 응답 본문이 너무 길면 로그/에러 메시지용으로 자른다
const MAX_ERROR_BODY: usize = 512;

/// OpenAI 호환 에러 본문
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Create from HTTP status code and body
pub fn from_http_status(status: u16, body: &str) -> JudgeError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 | 403 => JudgeError::NotConfigured(format!("authentication failed: {}", clip(&message))),
        _ => JudgeError::HttpStatus {
            status,
            body: clip(&message),
        },
    }
}

/// reqwest 에러 변환 (timeout은 별도 분류)
pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> JudgeError {
    if err.is_timeout() {
        JudgeError::Timeout(timeout.as_millis() as u64)
    } else if err.is_decode() {
        JudgeError::InvalidResponse(err.to_string())
    } else {
        JudgeError::Network(err.to_string())
    }
}

fn clip(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            from_http_status(401, "bad key"),
            JudgeError::NotConfigured(_)
        ));
        assert_eq!(
            from_http_status(503, "overloaded"),
            JudgeError::HttpStatus {
                status: 503,
                body: "overloaded".into()
            }
        );
    }

    #[test]
    fn test_extracts_api_error_message() {
        let body = r#"{"error": {"message": "model not found", "code": "model_not_found"}}"#;
        assert_eq!(
            from_http_status(404, body),
            JudgeError::HttpStatus {
                status: 404,
                body: "model not found".into()
            }
        );
    }

    #[test]
    fn test_long_body_clipped() {
        let body = "x".repeat(2000);
        match from_http_status(500, &body) {
            JudgeError::HttpStatus { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY + 3),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
