//! Config - 통합 설정 관리
//!
//! - `warden.rs` - WardenConfig 통합 설정 (실행, 확인, judge, 레지스트리)

mod warden;

pub use warden::{
    pattern_matches, ConfirmationConfig, ExecutionConfig, JudgeConfig, JudgeProtocol,
    RegistryConfig, WardenConfig, WARDEN_CONFIG_FILE,
};
