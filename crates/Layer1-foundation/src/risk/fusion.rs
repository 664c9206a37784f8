//! Risk Fusion - pattern 판정과 judge 판정 결합
//!
//! - judge 사용 불가: pattern 판정 그대로 (source = pattern-only)
//! - 둘 다 있음: 등급과 점수 모두 최대값, 사유는 pattern 먼저
//!
//! 어느 쪽이든 더 위험하다고 본 쪽을 따른다. 하향 조정은 없다.

use super::judge::JudgeError;
use super::types::{RiskVerdict, VerdictSource};
use tracing::warn;

/// 두 판정을 하나로 결합
pub fn fuse(pattern: RiskVerdict, judge: Result<RiskVerdict, JudgeError>) -> RiskVerdict {
    let judged = match judge {
        Ok(judged) => judged,
        Err(JudgeError::Disabled) => return as_pattern_only(pattern),
        Err(e) => {
            warn!("[fusion] Semantic judge unavailable, using pattern verdict: {}", e);
            return as_pattern_only(pattern);
        }
    };

    let level = pattern.level().max(judged.level());
    let score = pattern.score().max(judged.score());

    let mut reasons = pattern.reasons().to_vec();
    reasons.extend(judged.reasons().iter().cloned());

    RiskVerdict::new(level, score, reasons, VerdictSource::Fused)
}

fn as_pattern_only(pattern: RiskVerdict) -> RiskVerdict {
    if pattern.source() == VerdictSource::PatternOnly {
        return pattern;
    }
    RiskVerdict::new(
        pattern.level(),
        pattern.score(),
        pattern.reasons().to_vec(),
        VerdictSource::PatternOnly,
    )
}
