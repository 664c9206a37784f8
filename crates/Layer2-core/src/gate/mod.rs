//! Command Execution Gate
//!
//! Every shell command passes through here before it runs:
//! classify (pattern + optional semantic judge), fuse, then act on the level.
//!
//! ## Level policy
//!
//! | Level     | Outcome                                     |
//! |-----------|---------------------------------------------|
//! | safe      | executed                                    |
//! | caution   | executed, with a warning                    |
//! | dangerous | awaiting confirmation                       |
//! | critical  | awaiting confirmation, with a warning       |
//! | blocked   | refused, never runs                         |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use warden_core::gate::{CommandGate, CommandRequest};
//!
//! let gate = CommandGate::builder().build();
//! let record = gate.submit(CommandRequest::new("rm -rf build")).await?;
//! if let Some(token) = &record.confirmation_token {
//!     let record = gate.confirm(&record.id, token).await?;
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      CommandGate                         │
//! │  RECEIVED ─► CLASSIFIED ─┬─► EXECUTED ─┬─► (done)        │
//! │                          │             ├─► FAILED        │
//! │                          │             └─► TIMED_OUT     │
//! │                          ├─► AWAITING ─┬─► CONFIRMED ─►… │
//! │                          │   CONFIRMATION ─► REFUSED     │
//! │                          └─► REFUSED                     │
//! │  ┌────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │  pending   │  │   executor   │  │     history      │  │
//! │  └────────────┘  └──────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod executor;
pub mod history;
pub mod pending;
pub mod record;

pub use error::{GateError, Result};
pub use executor::{ProcessExecutor, ProcessOutcome, ProcessOutput, TRUNCATION_MARKER};
pub use history::ExecutionHistory;
pub use pending::PendingConfirmation;
pub use record::{ExecutionRecord, ExecutionStatus, GateState, Refusal, RefusalKind};

use chrono::{DateTime, Utc};
use pending::{Claim, PendingStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_foundation::{
    classifier, fuse, ConfirmationConfig, DisabledJudge, ExecutionConfig, JudgeContext,
    JudgeError, PatternClassifier, RiskLevel, RiskVerdict, SemanticJudge, WardenConfig,
};

/// Recent commands forwarded to the judge
const JUDGE_RECENT_COMMANDS: usize = 5;

/// Upper bound on a single judge call, whatever the judge does internally
const DEFAULT_JUDGE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// CommandRequest
// ============================================================================

/// A command submitted to the gate
#[derive(Debug, Clone, Default)]
pub struct CommandRequest {
    pub command: String,
    pub working_dir: Option<PathBuf>,
    /// Overrides the configured timeout
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl From<&str> for CommandRequest {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

impl From<String> for CommandRequest {
    fn from(command: String) -> Self {
        Self::new(command)
    }
}

/// A command cleared to run
struct Admitted {
    id: String,
    command: String,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    verdict: RiskVerdict,
    warning: Option<String>,
    started_at: DateTime<Utc>,
    trace: Vec<GateState>,
}

impl From<PendingConfirmation> for Admitted {
    fn from(entry: PendingConfirmation) -> Self {
        Self {
            id: entry.execution_id,
            command: entry.command,
            working_dir: entry.working_dir,
            timeout: entry.timeout,
            verdict: entry.verdict,
            warning: entry.warning,
            started_at: entry.started_at,
            trace: entry.trace,
        }
    }
}

// ============================================================================
// CommandGate
// ============================================================================

/// Risk-gated command execution
pub struct CommandGate {
    classifier: PatternClassifier,
    judge: Arc<dyn SemanticJudge>,
    judge_timeout: Duration,
    executor: ProcessExecutor,
    default_timeout: Duration,
    confirmation_ttl: Duration,
    reap_interval: Duration,
    pending: PendingStore,
    history: ExecutionHistory,
}

impl CommandGate {
    pub fn builder() -> CommandGateBuilder {
        CommandGateBuilder::new()
    }

    /// Gate with default rules, no judge and default limits
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn judge_name(&self) -> &str {
        self.judge.name()
    }

    pub fn classifier(&self) -> &PatternClassifier {
        &self.classifier
    }

    pub fn confirmation_ttl(&self) -> Duration {
        self.confirmation_ttl
    }

    pub fn execution_config(&self) -> &ExecutionConfig {
        self.executor.config()
    }

    // ========================================================================
    // Classification
    // ========================================================================

    /// Fused verdict for a command, without running it
    pub async fn evaluate(&self, command: &str) -> RiskVerdict {
        self.evaluate_in(command, None).await
    }

    async fn evaluate_in(&self, command: &str, working_dir: Option<&Path>) -> RiskVerdict {
        if !self.judge.is_enabled() {
            return fuse(self.classifier.classify(command), Err(JudgeError::Disabled));
        }

        let context = self.judge_context(working_dir);
        let judge_call = async {
            tokio::time::timeout(self.judge_timeout, self.judge.judge(command, &context))
                .await
                .unwrap_or_else(|_| Err(JudgeError::Timeout(self.judge_timeout.as_millis() as u64)))
        };
        let (pattern, judged) =
            tokio::join!(async { self.classifier.classify(command) }, judge_call);
        fuse(pattern, judged)
    }

    fn judge_context(&self, working_dir: Option<&Path>) -> JudgeContext {
        let mut context = JudgeContext::new()
            .with_recent_commands(self.history.recent_commands(JUDGE_RECENT_COMMANDS));
        let dir = working_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok());
        if let Some(dir) = dir {
            context = context.with_working_dir(dir.display().to_string());
        }
        context
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Classify a command and act on its level.
    ///
    /// Returns the record for every outcome, including refusals; use
    /// [`ExecutionRecord::into_result`] to turn those into errors.
    pub async fn submit(&self, request: impl Into<CommandRequest>) -> Result<ExecutionRecord> {
        let request = request.into();
        if request.command.trim().is_empty() {
            return Err(GateError::EmptyCommand);
        }
        self.sweep_expired();

        let id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let mut trace = vec![GateState::Received];

        let verdict = self
            .evaluate_in(&request.command, request.working_dir.as_deref())
            .await;
        trace.push(GateState::Classified);
        debug!(
            "[gate] {} classified {} ({:?})",
            id,
            verdict.summary(),
            verdict.source()
        );

        let level = verdict.level();
        let job = Admitted {
            id,
            command: request.command,
            working_dir: request.working_dir,
            timeout: request.timeout,
            verdict,
            warning: None,
            started_at,
            trace,
        };

        if level.is_blocked() {
            return Ok(self.refuse_blocked(job));
        }
        if level.requires_confirmation() {
            return Ok(self.hold(job));
        }

        let mut job = job;
        if level == RiskLevel::Caution {
            job.warning = Some(format!("Caution: {}", reason_list(&job.verdict)));
        }
        let cancel = request.cancel.unwrap_or_default();
        Ok(self.execute(job, &cancel).await)
    }

    fn refuse_blocked(&self, mut job: Admitted) -> ExecutionRecord {
        job.trace.push(GateState::Refused);
        let reason = format!("Blocked: {}", reason_list(&job.verdict));
        info!("[gate] refused {}: {}", job.id, reason);

        let mut record = self.record_for(job, ExecutionStatus::Refused);
        record.refusal = Some(Refusal {
            kind: RefusalKind::Blocked,
            reason,
        });
        record.finish();
        self.history.upsert(record.clone());
        record
    }

    fn hold(&self, mut job: Admitted) -> ExecutionRecord {
        job.trace.push(GateState::AwaitingConfirmation);
        job.warning = Some(if job.verdict.level() == RiskLevel::Critical {
            format!(
                "High-risk command: {}. Confirm only if you are certain.",
                reason_list(&job.verdict)
            )
        } else {
            format!("Requires confirmation: {}", reason_list(&job.verdict))
        });

        let token = Uuid::new_v4().to_string();
        let expires_at = expiry_time(self.confirmation_ttl);
        let deadline = Instant::now()
            .checked_add(self.confirmation_ttl)
            .unwrap_or_else(far_future);

        let entry = PendingConfirmation {
            execution_id: job.id.clone(),
            command: job.command.clone(),
            working_dir: job.working_dir.clone(),
            timeout: job.timeout,
            verdict: job.verdict.clone(),
            warning: job.warning.clone(),
            token: token.clone(),
            started_at: job.started_at,
            expires_at,
            deadline,
            trace: job.trace.clone(),
        };

        let mut record = self.record_for(job, ExecutionStatus::AwaitingConfirmation);
        record.confirmation_token = Some(token);
        record.expires_at = Some(expires_at);

        info!(
            "[gate] {} awaiting confirmation until {}: {}",
            record.id,
            expires_at.to_rfc3339(),
            record.command
        );
        self.pending.insert(entry);
        self.history.upsert(record.clone());
        record
    }

    // ========================================================================
    // Confirmation
    // ========================================================================

    /// Run a pending command after checking its token
    pub async fn confirm(&self, execution_id: &str, token: &str) -> Result<ExecutionRecord> {
        self.confirm_with(execution_id, token, CancellationToken::new())
            .await
    }

    /// `confirm` with a cancellation token for the resulting run
    pub async fn confirm_with(
        &self,
        execution_id: &str,
        token: &str,
        cancel: CancellationToken,
    ) -> Result<ExecutionRecord> {
        self.sweep_expired();

        match self.pending.claim(execution_id, Some(token)) {
            Claim::Taken(entry) => {
                let mut job = Admitted::from(*entry);
                job.trace.push(GateState::Confirmed);
                info!("[gate] {} confirmed", job.id);
                Ok(self.execute(job, &cancel).await)
            }
            Claim::Expired(entry) => {
                self.expire(*entry);
                Err(GateError::ConfirmationExpired(execution_id.to_string()))
            }
            Claim::BadToken => {
                warn!("[gate] invalid confirmation token for {}", execution_id);
                Err(GateError::InvalidToken(execution_id.to_string()))
            }
            Claim::Missing => Err(self.not_pending(execution_id)),
        }
    }

    /// Refuse a pending command
    pub fn deny(&self, execution_id: &str) -> Result<ExecutionRecord> {
        self.sweep_expired();

        match self.pending.claim(execution_id, None) {
            Claim::Taken(entry) => {
                let mut entry = *entry;
                entry.trace.push(GateState::Denied);
                info!("[gate] {} denied", entry.execution_id);
                Ok(self.refuse_pending(entry, RefusalKind::Denied, "Denied by user".to_string()))
            }
            Claim::Expired(entry) => {
                self.expire(*entry);
                Err(GateError::ConfirmationExpired(execution_id.to_string()))
            }
            Claim::BadToken | Claim::Missing => Err(self.not_pending(execution_id)),
        }
    }

    /// Commands currently awaiting confirmation, soonest expiry first
    pub fn pending(&self) -> Vec<PendingConfirmation> {
        self.sweep_expired();
        self.pending.list()
    }

    /// Resolve every expired pending confirmation as REFUSED
    pub fn sweep_expired(&self) -> Vec<ExecutionRecord> {
        self.pending
            .drain_expired(Instant::now())
            .into_iter()
            .map(|entry| self.expire(entry))
            .collect()
    }

    /// Periodically sweep expired confirmations until the gate is dropped
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let gate = Arc::downgrade(self);
        let interval = self.reap_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match gate.upgrade() {
                    Some(gate) => {
                        gate.sweep_expired();
                    }
                    None => break,
                }
            }
            debug!("[gate] reaper stopped");
        })
    }

    fn expire(&self, entry: PendingConfirmation) -> ExecutionRecord {
        info!("[gate] confirmation expired for {}", entry.execution_id);
        self.refuse_pending(entry, RefusalKind::Expired, "Confirmation expired".to_string())
    }

    fn refuse_pending(
        &self,
        entry: PendingConfirmation,
        kind: RefusalKind,
        reason: String,
    ) -> ExecutionRecord {
        let mut job = Admitted::from(entry);
        job.trace.push(GateState::Refused);
        let mut record = self.record_for(job, ExecutionStatus::Refused);
        record.refusal = Some(Refusal { kind, reason });
        record.finish();
        self.history.upsert(record.clone());
        record
    }

    fn not_pending(&self, execution_id: &str) -> GateError {
        match self.history.get(execution_id) {
            Some(record)
                if matches!(
                    record.refusal,
                    Some(Refusal {
                        kind: RefusalKind::Expired,
                        ..
                    })
                ) =>
            {
                GateError::ConfirmationExpired(execution_id.to_string())
            }
            Some(_) => GateError::AlreadyResolved(execution_id.to_string()),
            None => GateError::UnknownExecution(execution_id.to_string()),
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    async fn execute(&self, mut job: Admitted, cancel: &CancellationToken) -> ExecutionRecord {
        job.trace.push(GateState::Executed);
        let timeout = job.timeout.unwrap_or(self.default_timeout);
        let working_dir = job.working_dir.clone();

        let mut record = self.record_for(job, ExecutionStatus::Executed);
        record.timeout_ms = Some(timeout.as_millis() as u64);

        let outcome = self
            .executor
            .run(&record.command, working_dir.as_deref(), timeout, cancel)
            .await;

        match outcome {
            Ok(ProcessOutcome::Completed(out)) => {
                if out.exit_code != Some(0) {
                    record.status = ExecutionStatus::Failed;
                    record.trace.push(GateState::Failed);
                }
                record.exit_code = out.exit_code;
                record.stdout = Some(out.stdout);
                record.stderr = Some(out.stderr);
            }
            Ok(ProcessOutcome::TimedOut(out)) => {
                warn!("[gate] {} timed out after {:?}", record.id, timeout);
                record.status = ExecutionStatus::TimedOut;
                record.trace.push(GateState::TimedOut);
                record.partial_output = Some(out.combined());
            }
            Ok(ProcessOutcome::Cancelled(out)) => {
                info!("[gate] {} cancelled", record.id);
                record.status = ExecutionStatus::Cancelled;
                record.trace.push(GateState::Cancelled);
                record.partial_output = Some(out.combined());
            }
            Err(e) => {
                warn!("[gate] {} could not run: {}", record.id, e);
                record.status = ExecutionStatus::Failed;
                record.trace.push(GateState::Failed);
                record.exit_code = Some(127);
                record.stderr = Some(e.to_string());
            }
        }

        record.finish();
        debug!(
            "[gate] {} finished {} in {:?}ms",
            record.id, record.status, record.duration_ms
        );
        self.history.upsert(record.clone());
        record
    }

    fn record_for(&self, job: Admitted, status: ExecutionStatus) -> ExecutionRecord {
        let mut record = ExecutionRecord::new(
            job.id,
            job.command,
            job.working_dir.map(|d| d.display().to_string()),
            job.verdict,
            status,
            job.started_at,
            job.trace,
        );
        record.warning = job.warning;
        record
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Look up a record; expired confirmations are resolved first
    pub fn record(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.sweep_expired();
        self.history.get(execution_id)
    }

    /// Most recent records, newest first
    pub fn history(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.sweep_expired();
        self.history.recent(limit)
    }
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct CommandGateBuilder {
    classifier: Option<PatternClassifier>,
    judge: Option<Arc<dyn SemanticJudge>>,
    judge_timeout: Duration,
    execution: ExecutionConfig,
    confirmation: ConfirmationConfig,
    confirmation_ttl: Option<Duration>,
    reap_interval: Option<Duration>,
    history_limit: usize,
}

impl CommandGateBuilder {
    pub fn new() -> Self {
        Self {
            classifier: None,
            judge: None,
            judge_timeout: DEFAULT_JUDGE_TIMEOUT,
            execution: ExecutionConfig::default(),
            confirmation: ConfirmationConfig::default(),
            confirmation_ttl: None,
            reap_interval: None,
            history_limit: history::DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Take execution, confirmation and history settings from a config
    pub fn config(mut self, config: &WardenConfig) -> Self {
        self.execution = config.execution.clone();
        self.confirmation = config.confirmation.clone();
        self.history_limit = config.history_limit;
        // leave headroom so the judge's own timeout fires first
        self.judge_timeout = config.judge.timeout() + Duration::from_millis(500);
        self
    }

    pub fn classifier(mut self, classifier: PatternClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn judge(mut self, judge: Arc<dyn SemanticJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn judge_timeout(mut self, timeout: Duration) -> Self {
        self.judge_timeout = timeout;
        self
    }

    pub fn execution_config(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    /// Override the confirmation window (finer than whole seconds)
    pub fn confirmation_ttl(mut self, ttl: Duration) -> Self {
        self.confirmation_ttl = Some(ttl);
        self
    }

    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = Some(interval);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn build(self) -> CommandGate {
        let judge = self
            .judge
            .unwrap_or_else(|| Arc::new(DisabledJudge) as Arc<dyn SemanticJudge>);
        debug!("[gate] building with judge '{}'", judge.name());

        CommandGate {
            classifier: self.classifier.unwrap_or_else(|| classifier().clone()),
            judge,
            judge_timeout: self.judge_timeout,
            default_timeout: self.execution.timeout(),
            executor: ProcessExecutor::new(self.execution),
            confirmation_ttl: self.confirmation_ttl.unwrap_or(self.confirmation.ttl()),
            reap_interval: self
                .reap_interval
                .unwrap_or(self.confirmation.reap_interval())
                .max(Duration::from_millis(10)),
            pending: PendingStore::new(),
            history: ExecutionHistory::with_max_size(self.history_limit),
        }
    }
}

impl Default for CommandGateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn reason_list(verdict: &RiskVerdict) -> String {
    if verdict.reasons().is_empty() {
        verdict.level().to_string()
    } else {
        verdict.reasons().join("; ")
    }
}

fn expiry_time(ttl: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn far_future() -> Instant {
    // ~30 years; Instant has no MAX
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365 * 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = CommandRequest::new("ls")
            .with_working_dir("/tmp")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(req.command, "ls");
        assert_eq!(req.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(req.timeout, Some(Duration::from_secs(3)));

        let req: CommandRequest = "pwd".into();
        assert!(req.cancel.is_none());
    }

    #[test]
    fn test_reason_list() {
        let verdict = RiskVerdict::new(
            RiskLevel::Dangerous,
            65,
            vec!["Privilege escalation".into(), "Service management".into()],
            warden_foundation::VerdictSource::PatternOnly,
        );
        assert_eq!(reason_list(&verdict), "Privilege escalation; Service management");
        assert_eq!(
            reason_list(&RiskVerdict::safe(warden_foundation::VerdictSource::Fused)),
            "safe"
        );
    }

    #[test]
    fn test_expiry_time_saturates() {
        assert_eq!(expiry_time(Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert!(expiry_time(Duration::from_secs(60)) > Utc::now());
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let gate = CommandGate::new();
        assert!(matches!(
            gate.submit("   ").await,
            Err(GateError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn test_blocked_never_pending() {
        let gate = CommandGate::new();
        let record = gate.submit("rm -rf /").await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Refused);
        assert!(record.confirmation_token.is_none());
        assert!(gate.pending().is_empty());
        assert_eq!(
            record.trace,
            vec![GateState::Received, GateState::Classified, GateState::Refused]
        );
    }
}
