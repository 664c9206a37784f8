//! warden-core: Core Runtime for Warden
//!
//! Layer2 - 명령 실행 게이트와 서비스 레이어
//!
//! # 주요 모듈
//!
//! - `gate`: 위험도 기반 명령 실행 게이트 (확인/거부/타임아웃)
//! - `registry`: capability 인덱스를 가진 서비스 레지스트리
//! - `service`: Service trait, ServiceManager, built-in 서비스
//! - `judge`: 설정 기반 semantic judge 선택
//!
//! # 사용 예시
//!
//! ```ignore
//! use warden_core::{ServiceManager, CommandRequest};
//!
//! let manager = ServiceManager::builder()
//!     .config(WardenConfig::load()?)
//!     .snapshot_store(JsonStore::current_project()?)
//!     .build()?;
//!
//! // capability로 서비스 실행
//! let out = manager.invoke_capability("read", json!({"path": "Cargo.toml"})).await?;
//!
//! // 게이트 직접 사용
//! let record = manager.gate().submit(CommandRequest::new("ls -la")).await?;
//! ```

pub mod gate;
pub mod judge;
pub mod registry;
pub mod service;

// ============================================================================
// Re-exports: Gate
// ============================================================================
pub use gate::{
    CommandGate, CommandGateBuilder, CommandRequest, ExecutionRecord, ExecutionStatus, GateError,
    GateState, PendingConfirmation, RefusalKind,
};

// ============================================================================
// Re-exports: Registry
// ============================================================================
pub use registry::{
    CapabilityRegistry, MetadataValue, RegisterOutcome, RegistryEvent, RegistrySnapshot,
    ServiceDescriptor,
};

// ============================================================================
// Re-exports: Service
// ============================================================================
pub use service::{Service, ServiceManager, ServiceManagerBuilder, ServiceOutput};

pub use judge::judge_from_config;
