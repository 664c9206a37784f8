//! Shell Executor - CommandGate를 통한 명령 실행 서비스
//!
//! Actions:
//! - `run` (기본): `{command, workingDir?, timeoutSecs?}`
//! - `confirm`: `{executionId, token}`
//! - `deny`: `{executionId}`
//! - `classify`: `{command}` - 실행 없이 판정만
//! - `status`: `{executionId}`
//! - `systemInfo`: `uname -a`, `whoami`, `pwd` 결과 요약
//! - `processes`: `ps aux` (기본 20줄, `{limit?}`)
//! - `diskUsage`: `df -h`
//!
//! 조회용 action도 고정 명령을 게이트에 제출하므로 같은 판정을 거친다.
//! 거부/타임아웃/취소/만료는 `Err`로 그대로 전달된다.

use super::resolve_path;
use crate::gate::{CommandGate, CommandRequest, ExecutionRecord, ExecutionStatus};
use crate::registry::ServiceDescriptor;
use crate::service::traits::{parse_args, Service, ServiceOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use warden_foundation::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ShellAction {
    #[default]
    Run,
    Confirm,
    Deny,
    Classify,
    Status,
    SystemInfo,
    Processes,
    DiskUsage,
}

const DEFAULT_PROCESS_LINES: usize = 20;

/// Shell executor 입력
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShellInput {
    #[serde(default)]
    action: ShellAction,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    execution_id: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct ShellExecutorService {
    gate: Arc<CommandGate>,
    root: PathBuf,
}

impl ShellExecutorService {
    pub const NAME: &'static str = "shell_executor";

    pub fn new(gate: Arc<CommandGate>, root: &Path) -> Self {
        Self {
            gate,
            root: root.to_path_buf(),
        }
    }

    fn required(value: Option<String>, field: &str) -> Result<String> {
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("{}: '{}' is required", Self::NAME, field)))
    }

    /// 고정 명령을 워크스페이스 루트에서 실행
    async fn run_fixed(&self, command: &str) -> Result<ExecutionRecord> {
        let request = CommandRequest::new(command).with_working_dir(self.root.clone());
        Ok(self.gate.submit(request).await?.into_result()?)
    }

    fn stdout_line(record: &ExecutionRecord) -> String {
        match (&record.status, &record.stdout) {
            (ExecutionStatus::Executed, Some(out)) if !out.trim().is_empty() => {
                out.trim().to_string()
            }
            _ => "unknown".to_string(),
        }
    }

    async fn system_info(&self) -> Result<ServiceOutput> {
        let os = self.run_fixed("uname -a").await?;
        let user = self.run_fixed("whoami").await?;
        let pwd = self.run_fixed("pwd").await?;

        Ok(ServiceOutput::success(
            Self::NAME,
            json!({
                "os": Self::stdout_line(&os),
                "user": Self::stdout_line(&user),
                "workingDirectory": Self::stdout_line(&pwd),
                "platform": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
            }),
        ))
    }

    /// `ps aux`, `df -h` 같은 단일 조회 명령
    async fn report(&self, command: &str, max_lines: Option<usize>) -> Result<ServiceOutput> {
        let record = self.run_fixed(command).await?;
        let stdout = record.stdout.clone().unwrap_or_default();
        let output = match max_lines {
            Some(n) => stdout.lines().take(n).collect::<Vec<_>>().join("\n"),
            None => stdout,
        };

        let data = json!({
            "command": command,
            "output": output,
            "error": record.stderr.clone().filter(|_| record.status != ExecutionStatus::Executed),
            "exitCode": record.exit_code,
        });
        Ok(if record.status == ExecutionStatus::Executed {
            ServiceOutput::success(Self::NAME, data)
        } else {
            ServiceOutput::failure(Self::NAME, data)
        })
    }

    fn respond(&self, record: ExecutionRecord) -> Result<ServiceOutput> {
        let record = record.into_result()?;
        let data = serde_json::to_value(&record)?;
        Ok(if record.status == ExecutionStatus::Failed {
            ServiceOutput::failure(Self::NAME, data)
        } else {
            ServiceOutput::success(Self::NAME, data)
        })
    }
}

#[async_trait]
impl Service for ShellExecutorService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn descriptor(&self) -> ServiceDescriptor {
        let exec = self.gate.execution_config();
        ServiceDescriptor::new(
            Self::NAME,
            "Executes shell commands behind risk classification and confirmation",
        )
        .with_capabilities(["execute", "shell", "system_info", "process_management"])
        .with_metadata("type", "builtin")
        .with_metadata("priority", "high")
        .with_metadata("category", "system_operations")
        .with_metadata("timeout", exec.timeout_secs as i64)
        .with_metadata("max_output_size", exec.max_output_size as i64)
    }

    async fn invoke(&self, args: Value) -> Result<ServiceOutput> {
        let input: ShellInput = parse_args(Self::NAME, args)?;

        match input.action {
            ShellAction::Run => {
                let command = Self::required(input.command, "command")?;
                let working_dir = match input.working_dir {
                    Some(dir) => resolve_path(&self.root, &dir)?,
                    None => self.root.clone(),
                };
                let mut request = CommandRequest::new(command).with_working_dir(working_dir);
                if let Some(secs) = input.timeout_secs {
                    request = request.with_timeout(Duration::from_secs(secs));
                }
                let record = self.gate.submit(request).await?;
                self.respond(record)
            }
            ShellAction::Confirm => {
                let id = Self::required(input.execution_id, "executionId")?;
                let token = Self::required(input.token, "token")?;
                let record = self.gate.confirm(&id, &token).await?;
                self.respond(record)
            }
            ShellAction::Deny => {
                let id = Self::required(input.execution_id, "executionId")?;
                let record = self.gate.deny(&id)?;
                Ok(ServiceOutput::success(Self::NAME, serde_json::to_value(&record)?))
            }
            ShellAction::Classify => {
                let command = Self::required(input.command, "command")?;
                let verdict = self.gate.evaluate(&command).await;
                Ok(ServiceOutput::success(
                    Self::NAME,
                    json!({ "command": command, "verdict": verdict }),
                ))
            }
            ShellAction::Status => {
                let id = Self::required(input.execution_id, "executionId")?;
                let record = self
                    .gate
                    .record(&id)
                    .ok_or_else(|| Error::NotFound(format!("execution {}", id)))?;
                Ok(ServiceOutput::success(Self::NAME, serde_json::to_value(&record)?))
            }
            ShellAction::SystemInfo => self.system_info().await,
            ShellAction::Processes => {
                let lines = input.limit.unwrap_or(DEFAULT_PROCESS_LINES);
                self.report("ps aux", Some(lines)).await
            }
            ShellAction::DiskUsage => self.report("df -h", None).await,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn service(dir: &Path) -> ShellExecutorService {
        ShellExecutorService::new(Arc::new(CommandGate::new()), dir)
    }

    #[tokio::test]
    async fn test_run_in_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        let out = service(dir.path())
            .invoke(json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.data["status"], "EXECUTED");
        assert!(out.data["stdout"].as_str().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_failed_command_is_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = service(dir.path())
            .invoke(json!({"command": "exit 4"}))
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.data["exitCode"], 4);
    }

    #[tokio::test]
    async fn test_blocked_is_refused_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path())
            .invoke(json!({"command": ":(){ :|:& };:"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Refused(_)));
    }

    #[tokio::test]
    async fn test_confirm_flow() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("build")).unwrap();
        let svc = service(dir.path());

        let out = svc.invoke(json!({"command": "rm -rf build"})).await.unwrap();
        assert_eq!(out.data["status"], "AWAITING_CONFIRMATION");
        assert!(dir.path().join("build").exists());

        let id = out.data["id"].as_str().unwrap().to_string();
        let token = out.data["confirmationToken"].as_str().unwrap().to_string();

        let status = svc
            .invoke(json!({"action": "status", "executionId": id}))
            .await
            .unwrap();
        assert_eq!(status.data["status"], "AWAITING_CONFIRMATION");

        let out = svc
            .invoke(json!({"action": "confirm", "executionId": id, "token": token}))
            .await
            .unwrap();
        assert_eq!(out.data["status"], "EXECUTED");
        assert!(!dir.path().join("build").exists());
    }

    #[tokio::test]
    async fn test_classify_and_missing_args() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let out = svc
            .invoke(json!({"action": "classify", "command": "rm -rf /tmp/test"}))
            .await
            .unwrap();
        assert_eq!(out.data["verdict"]["level"], "dangerous");

        assert!(matches!(
            svc.invoke(json!({"action": "confirm", "executionId": "x"})).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            svc.invoke(json!({"action": "launch"})).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_system_info() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let out = svc.invoke(json!({"action": "systemInfo"})).await.unwrap();
        assert!(out.success);
        assert_ne!(out.data["os"], "unknown");
        assert!(!out.data["user"].as_str().unwrap().is_empty());
        let cwd = out.data["workingDirectory"].as_str().unwrap();
        assert!(cwd.ends_with(dir.path().file_name().unwrap().to_str().unwrap()));
        assert_eq!(out.data["platform"], std::env::consts::OS);

        // 세 명령 모두 게이트 이력에 남는다
        let history = svc.gate.history(10);
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|r| r.status == ExecutionStatus::Executed));
    }

    #[tokio::test]
    async fn test_processes() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let out = svc
            .invoke(json!({"action": "processes", "limit": 3}))
            .await
            .unwrap();
        assert_eq!(out.data["command"], "ps aux");
        if out.success {
            let output = out.data["output"].as_str().unwrap();
            assert!(output.contains("PID"));
            assert!(output.lines().count() <= 3);
        }
        assert_eq!(svc.gate.history(10)[0].command, "ps aux");
    }

    #[tokio::test]
    async fn test_disk_usage() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let out = svc.invoke(json!({"action": "diskUsage"})).await.unwrap();
        assert_eq!(out.data["command"], "df -h");
        if out.success {
            assert!(out.data["output"].as_str().unwrap().contains("Filesystem"));
            assert!(out.data["error"].is_null());
        }
        assert_eq!(svc.gate.history(10)[0].command, "df -h");
    }

    #[tokio::test]
    async fn test_report_actions_refused_under_blocking_rule() {
        use warden_foundation::{PatternClassifier, RiskLevel, RiskRule};

        let dir = tempfile::tempdir().unwrap();
        let classifier = PatternClassifier::empty().with_rule(RiskRule::prefix(
            "df",
            RiskLevel::Blocked,
            100,
            "Disk queries disabled",
        ));
        let gate = CommandGate::builder().classifier(classifier).build();
        let svc = ShellExecutorService::new(Arc::new(gate), dir.path());

        let err = svc
            .invoke(json!({"action": "diskUsage"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Refused(_)));
    }
}
