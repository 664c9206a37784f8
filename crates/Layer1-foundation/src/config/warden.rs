//! Warden Config - 통합 설정
//!
//! 글로벌(<config_dir>/warden/) + 프로젝트(.warden/) 설정을 병합한 뒤
//! 환경변수로 덮어쓴다.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// 설정 파일명
pub const WARDEN_CONFIG_FILE: &str = "warden.json";

/// Judge endpoint 환경변수
const ENV_JUDGE_ENDPOINT: &str = "WARDEN_JUDGE_ENDPOINT";

/// Judge 모델 환경변수
const ENV_JUDGE_MODEL: &str = "WARDEN_JUDGE_MODEL";

// ============================================================================
// Warden Config (통합)
// ============================================================================

/// Warden 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardenConfig {
    /// 명령 실행 설정
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// 확인 대기 설정
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Semantic judge 설정
    #[serde(default)]
    pub judge: JudgeConfig,

    /// 레지스트리 스냅샷 설정
    #[serde(default)]
    pub registry: RegistryConfig,

    /// 실행 기록 최대 개수
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            confirmation: ConfirmationConfig::default(),
            judge: JudgeConfig::default(),
            registry: RegistryConfig::default(),
            history_limit: default_history_limit(),
        }
    }
}

impl WardenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드 후 환경변수 적용
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<WardenConfig>(WARDEN_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<WardenConfig>(WARDEN_CONFIG_FILE)?
            {
                config.merge(project_config);
            }
        }

        // 3. 환경변수
        config.apply_env();

        Ok(config)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: WardenConfig) {
        self.execution.merge(other.execution);
        self.confirmation.merge(other.confirmation);
        self.judge.merge(other.judge);
        self.registry.merge(other.registry);
        if other.history_limit != default_history_limit() {
            self.history_limit = other.history_limit;
        }
    }

    /// 환경변수 덮어쓰기 (endpoint가 지정되면 judge 활성화)
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENV_JUDGE_ENDPOINT) {
            if !endpoint.trim().is_empty() {
                self.judge.endpoint = endpoint;
                self.judge.enabled = true;
            }
        }
        if let Ok(model) = std::env::var(ENV_JUDGE_MODEL) {
            if !model.trim().is_empty() {
                self.judge.model = model;
            }
        }
    }
}

// ============================================================================
// Execution Config
// ============================================================================

/// 서브프로세스 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// 실행 셸 (`<shell> -c <command>`)
    #[serde(default = "default_shell")]
    pub shell: String,

    /// 기본 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// stdout/stderr 각각의 최대 크기 (bytes)
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,

    /// 자식 프로세스에서 제거할 환경변수 (wildcard 지원)
    #[serde(default = "default_blocked_env")]
    pub blocked_env_vars: HashSet<String>,

    /// 출력에서 ANSI escape 제거
    #[serde(default = "default_true")]
    pub strip_ansi: bool,

    /// 타임아웃/취소 시 프로세스 그룹 전체 종료 (unix)
    #[serde(default = "default_true")]
    pub kill_process_group: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_secs: default_timeout_secs(),
            max_output_size: default_max_output_size(),
            blocked_env_vars: default_blocked_env(),
            strip_ansi: true,
            kill_process_group: true,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    /// 차단 대상 환경변수인지 확인
    pub fn is_env_blocked(&self, var_name: &str) -> bool {
        self.blocked_env_vars
            .iter()
            .any(|pattern| pattern_matches(pattern, var_name))
    }

    fn merge(&mut self, other: ExecutionConfig) {
        if other.shell != default_shell() {
            self.shell = other.shell;
        }
        if other.timeout_secs != default_timeout_secs() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.max_output_size != default_max_output_size() {
            self.max_output_size = other.max_output_size;
        }
        self.blocked_env_vars.extend(other.blocked_env_vars);
        self.strip_ansi = other.strip_ansi;
        self.kill_process_group = other.kill_process_group;
    }
}

// ============================================================================
// Confirmation Config
// ============================================================================

/// 확인 대기 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationConfig {
    /// 확인 대기 만료 시간 (초)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// 만료 항목 정리 주기 (초)
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

impl ConfirmationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }

    fn merge(&mut self, other: ConfirmationConfig) {
        if other.ttl_secs != default_ttl_secs() {
            self.ttl_secs = other.ttl_secs;
        }
        if other.reap_interval_secs != default_reap_interval_secs() {
            self.reap_interval_secs = other.reap_interval_secs;
        }
    }
}

// ============================================================================
// Judge Config
// ============================================================================

/// Judge 통신 프로토콜
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JudgeProtocol {
    /// `{command, context}` -> `{level, score, explanation}`
    #[default]
    Direct,
    /// OpenAI 호환 `/chat/completions`
    ChatCompletions,
}

/// Semantic judge 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub protocol: JudgeProtocol,

    /// Judge endpoint URL
    #[serde(default)]
    pub endpoint: String,

    /// API 키를 담은 환경변수 이름
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// 모델 이름 (chatCompletions 전용)
    #[serde(default = "default_judge_model")]
    pub model: String,

    /// 하드 타임아웃 (ms)
    #[serde(default = "default_judge_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            protocol: JudgeProtocol::default(),
            endpoint: String::new(),
            api_key_env: default_api_key_env(),
            model: default_judge_model(),
            timeout_ms: default_judge_timeout_ms(),
        }
    }
}

impl JudgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 설정된 환경변수에서 API 키 조회
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    fn merge(&mut self, other: JudgeConfig) {
        self.enabled = other.enabled;
        if other.protocol != JudgeProtocol::default() {
            self.protocol = other.protocol;
        }
        if !other.endpoint.is_empty() {
            self.endpoint = other.endpoint;
        }
        if other.api_key_env != default_api_key_env() {
            self.api_key_env = other.api_key_env;
        }
        if other.model != default_judge_model() {
            self.model = other.model;
        }
        if other.timeout_ms != default_judge_timeout_ms() {
            self.timeout_ms = other.timeout_ms;
        }
    }
}

// ============================================================================
// Registry Config
// ============================================================================

/// 레지스트리 스냅샷 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// 스냅샷 파일명 (JsonStore 기준)
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// 변경 시마다 스냅샷 저장
    #[serde(default)]
    pub persist_on_change: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            snapshot_file: default_snapshot_file(),
            persist_on_change: false,
        }
    }
}

impl RegistryConfig {
    fn merge(&mut self, other: RegistryConfig) {
        if other.snapshot_file != default_snapshot_file() {
            self.snapshot_file = other.snapshot_file;
        }
        self.persist_on_change = other.persist_on_change;
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_shell() -> String {
    if cfg!(windows) {
        "cmd".to_string()
    } else {
        "sh".to_string()
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_output_size() -> usize {
    1024 * 1024
}

fn default_blocked_env() -> HashSet<String> {
    [
        "AWS_SECRET*",
        "*_SECRET",
        "*_SECRET_*",
        "*_TOKEN",
        "*_PASSWORD",
        "*_API_KEY",
        "GITHUB_TOKEN",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_reap_interval_secs() -> u64 {
    5
}

fn default_api_key_env() -> String {
    "WARDEN_JUDGE_API_KEY".to_string()
}

fn default_judge_model() -> String {
    "moonshot-v1-8k".to_string()
}

fn default_judge_timeout_ms() -> u64 {
    10_000
}

fn default_snapshot_file() -> String {
    "registry.json".to_string()
}

fn default_history_limit() -> usize {
    1000
}

/// Simple wildcard pattern matching
pub fn pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if pattern.len() > 1 && pattern.starts_with('*') && pattern.ends_with('*') {
        let middle = &pattern[1..pattern.len() - 1];
        return value.contains(middle);
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        return value.ends_with(suffix);
    }

    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }

    if let Some(pos) = pattern.find('*') {
        let prefix = &pattern[..pos];
        let suffix = &pattern[pos + 1..];
        return value.len() >= prefix.len() + suffix.len()
            && value.starts_with(prefix)
            && value.ends_with(suffix);
    }

    pattern == value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WardenConfig::default();
        assert_eq!(config.execution.timeout_secs, 30);
        assert_eq!(config.execution.max_output_size, 1_048_576);
        assert_eq!(config.confirmation.ttl_secs, 300);
        assert!(!config.judge.enabled);
        assert_eq!(config.registry.snapshot_file, "registry.json");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"execution": {"timeoutSecs": 5}, "judge": {"enabled": true, "endpoint": "http://localhost:9000/judge"}}"#;
        let config: WardenConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.execution.timeout_secs, 5);
        assert_eq!(config.execution.max_output_size, 1_048_576);
        assert!(config.judge.enabled);
        assert_eq!(config.judge.protocol, JudgeProtocol::Direct);
        assert_eq!(config.history_limit, 1000);
    }

    #[test]
    fn test_merge_project_overrides_global() {
        let mut base = WardenConfig::default();
        let mut project = WardenConfig::default();
        project.execution.timeout_secs = 10;
        project.confirmation.ttl_secs = 60;
        project.judge.protocol = JudgeProtocol::ChatCompletions;
        project.judge.endpoint = "https://api.example.com/v1/chat/completions".into();

        base.merge(project);
        assert_eq!(base.execution.timeout_secs, 10);
        assert_eq!(base.confirmation.ttl_secs, 60);
        assert_eq!(base.judge.protocol, JudgeProtocol::ChatCompletions);
        assert_eq!(base.execution.max_output_size, 1_048_576);
    }

    #[test]
    fn test_blocked_env() {
        let config = ExecutionConfig::default();
        assert!(config.is_env_blocked("GITHUB_TOKEN"));
        assert!(config.is_env_blocked("OPENAI_API_KEY"));
        assert!(config.is_env_blocked("DB_PASSWORD"));
        assert!(!config.is_env_blocked("PATH"));
        assert!(!config.is_env_blocked("HOME"));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("git *", "git status"));
        assert!(pattern_matches("*_TOKEN", "GITHUB_TOKEN"));
        assert!(pattern_matches("AWS_*", "AWS_SECRET_KEY"));
        assert!(pattern_matches("*SECRET*", "MY_SECRET_VALUE"));
        assert!(pattern_matches("a*z", "abcz"));
        assert!(!pattern_matches("a*z", "abc"));
        assert!(!pattern_matches("git *", "npm install"));
    }
}
