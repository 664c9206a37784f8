//! # warden-foundation
//!
//! Foundation layer for Warden:
//! - Risk: 위험도 등급, Pattern Classifier, Semantic Judge trait, Fusion
//! - Config: 통합 설정 (WardenConfig)
//! - Storage: JsonStore (설정, 레지스트리 스냅샷)
//! - Error: 공통 에러 타입
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  command                                                │
//! │     │                                                   │
//! │     ├──────────────────┐                                │
//! │     ▼                  ▼                                │
//! │  PatternClassifier   SemanticJudge (optional)           │
//! │     │                  │                                │
//! │     └───────┬──────────┘                                │
//! │             ▼                                           │
//! │           fuse()  ──►  RiskVerdict  ──►  Gate (core)    │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod risk;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Risk
// ============================================================================
pub use risk::{
    classifier, fuse, DisabledJudge, JudgeContext, JudgeError, PatternClassifier, RiskLevel,
    RiskRule, RiskVerdict, SemanticJudge, VerdictSource,
};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    ConfirmationConfig, ExecutionConfig, JudgeConfig, JudgeProtocol, RegistryConfig,
    WardenConfig,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;
