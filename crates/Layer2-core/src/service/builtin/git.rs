//! Git Service - git 명령 실행 서비스
//!
//! git 바이너리를 직접 실행한다 (CommandGate 미경유).
//! 고정된 인자 목록만 만들기 때문에 셸 해석이 없다.

use super::resolve_path;
use crate::registry::ServiceDescriptor;
use crate::service::traits::{parse_args, Service, ServiceOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use warden_foundation::{Error, Result};

/// git 명령 타임아웃
const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// 기본 log 개수
const DEFAULT_LOG_COUNT: u32 = 10;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum GitAction {
    Status,
    Commit,
    Push,
    Pull,
    Diff,
    Log,
    Branch,
    Add,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitInput {
    action: GitAction,
    /// Repository dir, relative to the workspace root
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    remote: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    staged: bool,
    #[serde(default)]
    max_count: Option<u32>,
}

/// Captured git invocation
#[derive(Debug)]
struct GitRun {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

pub struct GitService {
    root: PathBuf,
}

impl GitService {
    pub const NAME: &'static str = "git_service";

    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Build git arguments for an action
    fn arguments(input: &GitInput) -> Result<Vec<String>> {
        let mut args: Vec<String> = Vec::new();
        match input.action {
            GitAction::Status => args.extend(["status".into(), "--short".into(), "--branch".into()]),
            GitAction::Commit => {
                let message = input
                    .message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("{}: commit requires 'message'", Self::NAME))
                    })?;
                args.extend(["commit".into(), "-m".into(), message.to_string()]);
            }
            GitAction::Add => {
                args.push("add".into());
                args.push("--".into());
                if input.files.is_empty() {
                    args.push(".".into());
                } else {
                    args.extend(input.files.iter().cloned());
                }
            }
            GitAction::Push | GitAction::Pull => {
                args.push(if matches!(input.action, GitAction::Push) { "push" } else { "pull" }.into());
                args.push(input.remote.clone().unwrap_or_else(|| "origin".to_string()));
                if let Some(branch) = &input.branch {
                    args.push(branch.clone());
                }
            }
            GitAction::Diff => {
                args.push("diff".into());
                if input.staged {
                    args.push("--cached".into());
                }
            }
            GitAction::Log => {
                let count = input.max_count.unwrap_or(DEFAULT_LOG_COUNT);
                args.extend([
                    "log".into(),
                    "--oneline".into(),
                    format!("--max-count={}", count),
                ]);
            }
            GitAction::Branch => {
                args.push("branch".into());
                match &input.branch {
                    Some(name) => args.push(name.clone()),
                    None => args.push("--list".into()),
                }
            }
        }
        Ok(args)
    }

    async fn run_git(dir: &Path, args: &[String]) -> Result<GitRun> {
        let child = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(GitRun {
                    exit_code: 127,
                    stdout: String::new(),
                    stderr: format!("git not found: {}", e),
                });
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let output = tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| Error::timeout(format!("git {} timed out", args.join(" "))))??;

        Ok(GitRun {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Service for GitService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(Self::NAME, "Runs git operations in the workspace repository")
            .with_capabilities(["status", "commit", "push", "pull", "diff", "log", "branch", "add"])
            .with_metadata("type", "builtin")
            .with_metadata("priority", "high")
    }

    async fn invoke(&self, args: Value) -> Result<ServiceOutput> {
        let input: GitInput = parse_args(Self::NAME, args)?;
        let dir = match &input.path {
            Some(path) => resolve_path(&self.root, path)?,
            None => self.root.clone(),
        };
        if !dir.is_dir() {
            return Err(Error::NotFound(dir.display().to_string()));
        }

        let git_args = Self::arguments(&input)?;
        debug!("[{}] git {}", Self::NAME, git_args.join(" "));
        let run = Self::run_git(&dir, &git_args).await?;

        let success = run.exit_code == 0;
        let data = json!({
            "success": success,
            "stdout": run.stdout,
            "stderr": run.stderr,
            "exitCode": run.exit_code,
        });
        Ok(if success {
            ServiceOutput::success(Self::NAME, data)
        } else {
            ServiceOutput::failure(Self::NAME, data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(value: Value) -> GitInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_arguments() {
        assert_eq!(
            GitService::arguments(&input(json!({"action": "status"}))).unwrap(),
            vec!["status", "--short", "--branch"]
        );
        assert_eq!(
            GitService::arguments(&input(json!({"action": "commit", "message": "fix; rm -rf /"}))).unwrap(),
            vec!["commit", "-m", "fix; rm -rf /"]
        );
        assert_eq!(
            GitService::arguments(&input(json!({"action": "add"}))).unwrap(),
            vec!["add", "--", "."]
        );
        assert_eq!(
            GitService::arguments(&input(json!({"action": "push", "branch": "main"}))).unwrap(),
            vec!["push", "origin", "main"]
        );
        assert_eq!(
            GitService::arguments(&input(json!({"action": "log", "maxCount": 3}))).unwrap(),
            vec!["log", "--oneline", "--max-count=3"]
        );
        assert_eq!(
            GitService::arguments(&input(json!({"action": "diff", "staged": true}))).unwrap(),
            vec!["diff", "--cached"]
        );
    }

    #[test]
    fn test_commit_requires_message() {
        assert!(matches!(
            GitService::arguments(&input(json!({"action": "commit"}))),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_status_outside_repository_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = GitService::new(dir.path())
            .invoke(json!({"action": "status"}))
            .await
            .unwrap();
        // either git is missing (127) or the dir is not a repository (128)
        assert!(!out.success);
        assert_ne!(out.data["exitCode"], 0);
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GitService::new(dir.path()).invoke(json!({"action": "rebase"})).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
