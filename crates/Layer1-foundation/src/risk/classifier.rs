//! Pattern Classifier - 규칙 기반 위험도 판정
//!
//! 순서가 있는 규칙 목록을 입력 전체에 대해 평가한다.
//! - 최종 등급: 매칭된 규칙 중 최대 등급 (첫 매칭이 아님)
//! - 점수: 최대 등급에 속한 매칭 규칙 중 최대 점수
//! - 사유: 최대 등급의 매칭 규칙 사유를 정의 순서대로 연결
//!
//! I/O 없음, 외부 호출 없음. 정규식은 `regex` crate로 선형 시간에 매칭된다.

use super::types::{RiskLevel, RiskVerdict, VerdictSource};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

// ============================================================
// 규칙 정의
// ============================================================

/// 규칙 매칭 방식
#[derive(Debug, Clone)]
pub enum RuleMatcher {
    /// 정규화된 명령 전체에 대한 부분 문자열
    Contains(String),
    /// 셸 세그먼트(`;`, `&&`, `||`, `|`)의 선두 단어들
    Prefix(Vec<String>),
    /// 정규화된 명령 전체에 대한 정규식
    Regex(Regex),
    /// `rm` 의 피연산자 (따옴표 해제 후 경로 정규화, `$HOME` 은 `~`)
    DeleteTarget(Vec<String>),
}

/// 위험도 규칙
#[derive(Debug, Clone)]
pub struct RiskRule {
    pub matcher: RuleMatcher,
    pub level: RiskLevel,
    pub score: u8,
    pub reason: String,
}

impl RiskRule {
    pub fn contains(
        needle: impl Into<String>,
        level: RiskLevel,
        score: u8,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            matcher: RuleMatcher::Contains(normalize(&needle.into())),
            level,
            score: score.min(100),
            reason: reason.into(),
        }
    }

    /// `prefix("git push", ...)` 처럼 여러 단어도 가능
    pub fn prefix(
        words: impl Into<String>,
        level: RiskLevel,
        score: u8,
        reason: impl Into<String>,
    ) -> Self {
        let words = normalize(&words.into())
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(String::from)
            .collect();
        Self {
            matcher: RuleMatcher::Prefix(words),
            level,
            score: score.min(100),
            reason: reason.into(),
        }
    }

    /// 정규식은 소문자로 정규화된 입력에 대해 매칭된다
    pub fn regex(
        pattern: &str,
        level: RiskLevel,
        score: u8,
        reason: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: RuleMatcher::Regex(Regex::new(pattern)?),
            level,
            score: score.min(100),
            reason: reason.into(),
        })
    }

    /// `delete_target("/ ~", ...)` 처럼 공백으로 구분된 경로 목록
    pub fn delete_target(
        paths: impl Into<String>,
        level: RiskLevel,
        score: u8,
        reason: impl Into<String>,
    ) -> Self {
        let paths = normalize(&paths.into())
            .split(' ')
            .filter(|p| !p.is_empty())
            .map(canonical_target)
            .collect();
        Self {
            matcher: RuleMatcher::DeleteTarget(paths),
            level,
            score: score.min(100),
            reason: reason.into(),
        }
    }

    fn matches(&self, normalized: &str, segments: &[Vec<String>]) -> bool {
        match &self.matcher {
            RuleMatcher::Contains(needle) => !needle.is_empty() && normalized.contains(needle),
            RuleMatcher::Prefix(words) => {
                !words.is_empty()
                    && segments
                        .iter()
                        .any(|seg| seg.len() >= words.len() && seg[..words.len()] == words[..])
            }
            RuleMatcher::Regex(re) => re.is_match(normalized),
            RuleMatcher::DeleteTarget(paths) => segments
                .iter()
                .any(|seg| delete_operands(seg).iter().any(|op| paths.contains(op))),
        }
    }
}

// ============================================================
// 기본 규칙 테이블
// ============================================================

#[derive(Clone, Copy)]
enum Kind {
    Contains,
    Prefix,
    Regex,
    Target,
}

use Kind::{Contains, Prefix, Regex as Re, Target};
use RiskLevel::{Blocked, Caution, Critical, Dangerous};

/// 기본 규칙 (정의 순서 = 사유 연결 순서)
const DEFAULT_RULES: &[(Kind, &str, RiskLevel, u8, &str)] = &[
    // 루트/홈 삭제
    (Target, "/ ~", Blocked, 100, "Deletes the root or home directory"),
    // Fork bomb
    (
        Re,
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        Blocked,
        100,
        "Fork bomb",
    ),
    (Contains, ":|:&", Blocked, 100, "Fork bomb"),
    // 역방향 셸
    (Contains, "/dev/tcp/", Blocked, 100, "Reverse shell over /dev/tcp"),
    (Contains, "/dev/udp/", Blocked, 100, "Reverse shell over /dev/udp"),
    // 디스크 파괴
    (
        Re,
        r">\s*/dev/(?:sd|hd|vd|xvd|nvme|disk|mmcblk)[a-z0-9]*",
        Blocked,
        100,
        "Raw write to a block device",
    ),
    (
        Re,
        r"\bdd\b.*\bof=/dev/(?:sd|hd|vd|xvd|nvme|disk|mmcblk)",
        Blocked,
        100,
        "Disk overwrite",
    ),
    // 시스템 디렉토리 삭제
    (
        Target,
        "/bin /boot /dev /etc /home /lib /lib64 /opt /proc /root /sbin /srv /sys /usr /var",
        Critical,
        90,
        "Deletes a top-level system directory",
    ),
    (
        Re,
        r"\bfind\s+/\s.*-delete\b",
        Critical,
        90,
        "Mass delete from the filesystem root",
    ),
    (Prefix, "sudo rm", Critical, 90, "Privileged delete"),
    // 파일시스템 / 디스크
    (Re, r"\bmkfs(?:\.[a-z0-9]+)?\b", Critical, 95, "Filesystem format"),
    (Re, r"\bdd\s+.*\bif=", Critical, 85, "Raw disk copy"),
    // 원격 스크립트 실행 / 네트워크 유출
    (
        Re,
        r"\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|da|k|fi)?sh\b",
        Critical,
        95,
        "Remote content piped into a shell",
    ),
    (
        Re,
        r"\b(?:ba|z|da|k)?sh\s+<\(\s*(?:curl|wget)\b",
        Critical,
        95,
        "Remote content piped into a shell",
    ),
    (
        Re,
        r"\|\s*(?:nc|ncat|netcat)\b",
        Critical,
        90,
        "Output piped to a network socket",
    ),
    // 시스템 종료
    (Prefix, "shutdown", Critical, 90, "System shutdown or reboot"),
    (Prefix, "reboot", Critical, 90, "System shutdown or reboot"),
    (Prefix, "halt", Critical, 90, "System shutdown or reboot"),
    (Prefix, "poweroff", Critical, 90, "System shutdown or reboot"),
    (Prefix, "init 0", Critical, 90, "System shutdown or reboot"),
    (Prefix, "init 6", Critical, 90, "System shutdown or reboot"),
    // 권한 파괴
    (
        Re,
        r"\bchmod\s+(?:-[a-z]+\s+)*[0-7]?777\s+/(?:\s|$)",
        Critical,
        90,
        "Makes the filesystem root world-writable",
    ),
    // 재귀 삭제 (일반)
    (
        Re,
        r"\brm\s+(?:\S+\s+)*-(?:[a-z]*r[a-z]*|-recursive)\b",
        Dangerous,
        70,
        "Recursive delete",
    ),
    // 권한 상승
    (Prefix, "sudo", Dangerous, 65, "Privilege escalation"),
    (Prefix, "su", Dangerous, 65, "Privilege escalation"),
    (Prefix, "doas", Dangerous, 65, "Privilege escalation"),
    (Prefix, "pkexec", Dangerous, 65, "Privilege escalation"),
    // 서비스 / 커널
    (Prefix, "systemctl", Dangerous, 60, "Service management"),
    (Prefix, "service", Dangerous, 60, "Service management"),
    (
        Re,
        r"\b(?:insmod|rmmod|modprobe)\b",
        Dangerous,
        65,
        "Kernel module change",
    ),
    // Git 파괴적 명령
    (
        Re,
        r"\bgit\s+push\b.*(?:\s--force(?:\s|$)|\s-f(?:\s|$))",
        Dangerous,
        70,
        "Force push rewrites remote history",
    ),
    (
        Re,
        r"\bgit\s+reset\s+(?:\S+\s+)*--hard\b",
        Dangerous,
        65,
        "Discards uncommitted changes",
    ),
    (
        Re,
        r"\bgit\s+clean\s+(?:\S+\s+)*-[a-z]*f",
        Dangerous,
        60,
        "Deletes untracked files",
    ),
    // 프로세스 종료
    (Re, r"\bkill\s+-(?:9|kill)\b", Dangerous, 55, "Force kill"),
    (Prefix, "killall", Dangerous, 55, "Mass process kill"),
    (Prefix, "pkill", Dangerous, 55, "Mass process kill"),
    // 권한 / 설정
    (
        Re,
        r"\bch(?:mod|own|grp)\s+(?:\S+\s+)*-[a-z]*r",
        Dangerous,
        55,
        "Recursive permission change",
    ),
    (Re, r"\bcrontab\s+-r\b", Dangerous, 60, "Removes the crontab"),
    (
        Re,
        r">\s*/etc/",
        Dangerous,
        70,
        "Overwrites system configuration",
    ),
    (Contains, "history -c", Dangerous, 50, "Clears shell history"),
    (
        Re,
        r"\bdrop\s+(?:table|database|schema)\b",
        Dangerous,
        60,
        "Destructive SQL statement",
    ),
    // 데이터 유출
    (
        Re,
        r"\bcurl\b.*\s(?:-d|--data(?:-binary)?|-f|--form|-t|--upload-file)\s+@",
        Dangerous,
        70,
        "Uploads a local file to a remote host",
    ),
    // 주의
    (Prefix, "rm", Caution, 40, "File deletion"),
    (Prefix, "rmdir", Caution, 30, "Directory removal"),
    (Prefix, "mv", Caution, 25, "Moves or renames files"),
    (Prefix, "chmod", Caution, 30, "Permission change"),
    (Prefix, "chown", Caution, 30, "Ownership change"),
    (Prefix, "curl", Caution, 25, "Network access"),
    (Prefix, "wget", Caution, 25, "Network access"),
    (
        Re,
        r"\b(?:pip3?|npm|yarn|pnpm|cargo|apt|apt-get|yum|dnf|brew|gem)\s+(?:install|add|i)\b",
        Caution,
        30,
        "Package installation",
    ),
    (Prefix, "git push", Caution, 30, "Publishes commits"),
    (Prefix, "git commit", Caution, 20, "Records commits"),
    (Re, r"\bsed\s+(?:\S+\s+)*-i\b", Caution, 20, "In-place file edit"),
];

fn build_rule(kind: Kind, pattern: &str, level: RiskLevel, score: u8, reason: &str) -> Option<RiskRule> {
    match kind {
        Kind::Contains => Some(RiskRule::contains(pattern, level, score, reason)),
        Kind::Prefix => Some(RiskRule::prefix(pattern, level, score, reason)),
        Kind::Regex => RiskRule::regex(pattern, level, score, reason).ok(),
        Kind::Target => Some(RiskRule::delete_target(pattern, level, score, reason)),
    }
}

/// 기본 규칙 목록
pub fn default_rules() -> Vec<RiskRule> {
    DEFAULT_RULES
        .iter()
        .filter_map(|&(kind, pattern, level, score, reason)| {
            build_rule(kind, pattern, level, score, reason)
        })
        .collect()
}

// ============================================================
// PatternClassifier
// ============================================================

/// 규칙 기반 분류기
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    rules: Vec<RiskRule>,
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternClassifier {
    /// 기본 규칙으로 생성
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// 규칙 없는 분류기
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// 규칙 추가 (기존 규칙 뒤에)
    pub fn with_rule(mut self, rule: RiskRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[RiskRule] {
        &self.rules
    }

    /// 명령어 분류
    pub fn classify(&self, command: &str) -> RiskVerdict {
        let normalized = normalize(command);
        if normalized.is_empty() {
            return RiskVerdict::safe(VerdictSource::PatternOnly);
        }

        let mut segments: Vec<Vec<String>> = Vec::new();
        for words in split_segments(&normalized).map(segment_words) {
            if words.is_empty() {
                continue;
            }
            // `sudo systemctl ...` 은 `systemctl ...` 로도 평가
            if let Some(inner) = strip_wrappers(&words) {
                segments.push(words);
                segments.push(inner);
            } else {
                segments.push(words);
            }
        }

        let mut winner: Option<(RiskLevel, u8)> = None;
        let mut reasons: Vec<String> = Vec::new();

        for rule in &self.rules {
            if !rule.matches(&normalized, &segments) {
                continue;
            }

            match winner {
                Some((level, score)) if rule.level == level => {
                    winner = Some((level, score.max(rule.score)));
                    if !reasons.contains(&rule.reason) {
                        reasons.push(rule.reason.clone());
                    }
                }
                Some((level, _)) if rule.level < level => {}
                _ => {
                    winner = Some((rule.level, rule.score));
                    reasons = vec![rule.reason.clone()];
                }
            }
        }

        let verdict = match winner {
            Some((level, score)) => {
                RiskVerdict::new(level, score, reasons, VerdictSource::PatternOnly)
            }
            None => RiskVerdict::safe(VerdictSource::PatternOnly),
        };

        debug!("[classifier] '{}' -> {}", normalized, verdict.summary());
        verdict
    }
}

/// 기본 규칙 분류기 (프로세스 전역, 최초 1회 컴파일)
pub fn classifier() -> &'static PatternClassifier {
    static CLASSIFIER: OnceLock<PatternClassifier> = OnceLock::new();
    CLASSIFIER.get_or_init(PatternClassifier::new)
}

// ============================================================
// 정규화
// ============================================================

/// 앞뒤 공백 제거, 공백 압축, 소문자화. 줄바꿈은 `;` 로 취급
pub fn normalize(command: &str) -> String {
    command
        .replace(['\n', '\r'], " ; ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn split_segments(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split(|c| matches!(c, ';' | '|' | '&' | '(' | ')' | '`'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 세그먼트의 단어 목록 (선행 `VAR=value` 제거, 첫 단어는 basename)
fn segment_words(segment: &str) -> Vec<String> {
    let tokens = shlex::split(segment)
        .unwrap_or_else(|| segment.split_whitespace().map(String::from).collect());

    let mut words: Vec<String> = tokens
        .into_iter()
        .skip_while(|t| is_env_assignment(t))
        .collect();

    if let Some(first) = words.first_mut() {
        if let Some(base) = first.rsplit('/').next() {
            if !base.is_empty() {
                *first = base.to_string();
            }
        }
    }
    words
}

/// 다른 명령을 감싸서 실행하는 래퍼
const WRAPPERS: &[&str] = &["sudo", "doas", "nohup", "time", "nice", "env", "exec", "command"];

/// 선행 래퍼와 그 옵션을 벗겨낸 단어 목록
fn strip_wrappers(words: &[String]) -> Option<Vec<String>> {
    let mut rest = words;
    while let Some(first) = rest.first() {
        if !WRAPPERS.contains(&first.as_str()) {
            break;
        }
        rest = &rest[1..];
        while rest
            .first()
            .is_some_and(|w| w.starts_with('-') || is_env_assignment(w))
        {
            rest = &rest[1..];
        }
    }

    if rest.len() == words.len() || rest.is_empty() {
        None
    } else {
        Some(rest.to_vec())
    }
}

/// 세그먼트 안의 `rm` 피연산자. `rm` 은 선두이거나 `xargs`/`find -exec` 뒤에 와야 한다
fn delete_operands(words: &[String]) -> Vec<String> {
    let Some(start) = words.iter().enumerate().position(|(i, w)| {
        w == "rm"
            && (i == 0
                || words[..i]
                    .iter()
                    .any(|p| matches!(p.as_str(), "xargs" | "-exec" | "-execdir")))
    }) else {
        return Vec::new();
    };

    let mut operands = Vec::new();
    let mut options_done = false;
    for word in &words[start + 1..] {
        if !options_done && word == "--" {
            options_done = true;
        } else if options_done || !word.starts_with('-') {
            operands.push(canonical_target(word));
        }
    }
    operands
}

/// `//`, `/.`, `/etc/`, `${home}/*` 같은 표기를 `/`, `/etc`, `~` 로 맞춘다
fn canonical_target(word: &str) -> String {
    let mut path = word.to_string();
    for var in ["${home}", "$home"] {
        if let Some(rest) = word.strip_prefix(var) {
            if rest.is_empty() || rest.starts_with('/') {
                path = format!("~{}", rest);
            }
            break;
        }
    }

    let (anchor, rest) = if path == "~" || path.starts_with("~/") {
        ("~", &path[1..])
    } else if path.starts_with('/') {
        ("/", path.as_str())
    } else {
        return path;
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    if parts.last() == Some(&"*") {
        parts.pop();
    }

    match (anchor, parts.is_empty()) {
        ("~", true) => "~".to_string(),
        ("~", false) => format!("~/{}", parts.join("/")),
        (_, _) => format!("/{}", parts.join("/")),
    }
}

fn is_env_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}
