//! Risk 타입 - 위험도 등급과 판정 결과

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================
// RiskLevel - 닫힌 순서형 위험 등급
// ============================================================

/// 명령어 위험 등급
///
/// `Safe < Caution < Dangerous < Critical < Blocked` 순서가 `Ord`로 보장된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// 안전 - 바로 실행
    Safe,
    /// 주의 - 경고와 함께 실행
    Caution,
    /// 위험 - 확인 필요
    Dangerous,
    /// 치명적 - 경고와 함께 확인 필요
    Critical,
    /// 차단 - 실행 경로 없음
    Blocked,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Safe,
        RiskLevel::Caution,
        RiskLevel::Dangerous,
        RiskLevel::Critical,
        RiskLevel::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Dangerous => "dangerous",
            RiskLevel::Critical => "critical",
            RiskLevel::Blocked => "blocked",
        }
    }

    /// 등급별 기본 점수 (judge가 점수를 주지 않을 때)
    pub fn default_score(&self) -> u8 {
        match self {
            RiskLevel::Safe => 0,
            RiskLevel::Caution => 30,
            RiskLevel::Dangerous => 60,
            RiskLevel::Critical => 85,
            RiskLevel::Blocked => 100,
        }
    }

    /// 실행 전 확인이 필요한지
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, RiskLevel::Dangerous | RiskLevel::Critical)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, RiskLevel::Blocked)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "caution" => Ok(RiskLevel::Caution),
            "dangerous" => Ok(RiskLevel::Dangerous),
            "critical" => Ok(RiskLevel::Critical),
            "blocked" => Ok(RiskLevel::Blocked),
            other => Err(format!("Unknown risk level: {}", other)),
        }
    }
}

// ============================================================
// VerdictSource
// ============================================================

/// 판정을 만든 구성요소
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictSource {
    PatternOnly,
    JudgeOnly,
    Fused,
}

impl fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictSource::PatternOnly => "pattern-only",
            VerdictSource::JudgeOnly => "judge-only",
            VerdictSource::Fused => "fused",
        };
        f.write_str(s)
    }
}

// ============================================================
// RiskVerdict
// ============================================================

/// 명령어 하나에 대한 판정 결과 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    level: RiskLevel,
    score: u8,
    reasons: Vec<String>,
    source: VerdictSource,
}

impl RiskVerdict {
    /// 점수는 0-100 범위로 잘린다
    pub fn new(level: RiskLevel, score: u8, reasons: Vec<String>, source: VerdictSource) -> Self {
        Self {
            level,
            score: score.min(100),
            reasons,
            source,
        }
    }

    /// 매칭 규칙이 없을 때의 판정
    pub fn safe(source: VerdictSource) -> Self {
        Self::new(RiskLevel::Safe, 0, Vec::new(), source)
    }

    pub fn level(&self) -> RiskLevel {
        self.level
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn source(&self) -> VerdictSource {
        self.source
    }

    /// 사람이 읽을 수 있는 요약 (`dangerous (70): Recursive delete`)
    pub fn summary(&self) -> String {
        if self.reasons.is_empty() {
            format!("{} ({})", self.level, self.score)
        } else {
            format!("{} ({}): {}", self.level, self.score, self.reasons.join("; "))
        }
    }
}
