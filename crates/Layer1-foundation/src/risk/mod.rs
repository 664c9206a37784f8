//! Risk - 명령어 위험도 판정
//!
//! - `types`: RiskLevel, RiskVerdict, VerdictSource
//! - `classifier`: 규칙 기반 Pattern Classifier
//! - `judge`: SemanticJudge trait + DisabledJudge
//! - `fusion`: 두 판정의 결정적 결합

mod classifier;
mod fusion;
mod judge;
mod types;

pub use classifier::{classifier, default_rules, normalize, PatternClassifier, RiskRule, RuleMatcher};
pub use fusion::fuse;
pub use judge::{DisabledJudge, JudgeContext, JudgeError, SemanticJudge};
pub use types::{RiskLevel, RiskVerdict, VerdictSource};
