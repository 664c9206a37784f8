//! Storage module for Warden
//!
//! - `json`: JSON - 설정 및 레지스트리 스냅샷 저장/로드

mod json;

// JSON Storage (범용)
pub use json::JsonStore;
