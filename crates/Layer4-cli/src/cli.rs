//! Command implementations
//!
//! 각 함수는 프로세스 종료 코드를 돌려준다.
//! - 0: 성공 (exec는 명령의 종료 코드를 그대로 반영)
//! - 124: 타임아웃, 126: 거부 (classify는 BLOCKED일 때), 130: 취소

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use warden_core::{
    CommandRequest, ExecutionRecord, ExecutionStatus, GateError, MetadataValue,
    ServiceDescriptor, ServiceManager,
};
use warden_foundation::{Error, JsonStore, RiskVerdict, WardenConfig};

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_TIMEOUT: u8 = 124;
pub const EXIT_REFUSED: u8 = 126;
pub const EXIT_CANCELLED: u8 = 130;

/// Options shared by every command
pub struct Session {
    pub config: WardenConfig,
    pub use_snapshot: bool,
    pub json: bool,
}

impl Session {
    fn manager(&self) -> anyhow::Result<ServiceManager> {
        let mut builder = ServiceManager::builder().config(self.config.clone());
        if self.use_snapshot {
            builder = builder.snapshot_store(JsonStore::current_project()?);
        }
        Ok(builder.build()?)
    }

    fn print_json(&self, value: &impl serde::Serialize) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

// ============================================================================
// classify / exec
// ============================================================================

pub async fn classify(session: &Session, command: &str) -> anyhow::Result<u8> {
    let manager = session.manager()?;
    let verdict = manager.gate().evaluate(command).await;

    if session.json {
        session.print_json(&verdict)?;
    } else {
        print_verdict(&verdict);
    }
    Ok(if verdict.level().is_blocked() { EXIT_REFUSED } else { 0 })
}

pub async fn exec(
    session: &Session,
    command: &str,
    yes: bool,
    timeout: Option<u64>,
    dir: Option<String>,
) -> anyhow::Result<u8> {
    let manager = session.manager()?;
    let gate = manager.gate();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut request = CommandRequest::new(command).with_cancel(cancel.clone());
    if let Some(secs) = timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }
    if let Some(dir) = dir {
        request = request.with_working_dir(dir);
    }

    let mut record = match gate.submit(request).await {
        Ok(record) => record,
        Err(e) => return gate_failure(e),
    };

    if record.status == ExecutionStatus::AwaitingConfirmation {
        if let Some(warning) = &record.warning {
            eprintln!("⚠ {}", warning);
        }
        let token = record
            .confirmation_token
            .clone()
            .context("pending execution has no confirmation token")?;

        let approved = yes
            || tokio::select! {
                answer = prompt_confirm(command) => answer?,
                _ = cancel.cancelled() => false,
            };
        let answered = if approved {
            gate.confirm_with(&record.id, &token, cancel).await
        } else {
            gate.deny(&record.id)
        };
        record = match answered {
            Ok(record) => record,
            Err(e) => return gate_failure(e),
        };
    } else if let Some(warning) = &record.warning {
        eprintln!("⚠ {}", warning);
    }

    if session.json {
        session.print_json(&record)?;
    } else {
        print_record(&record);
    }
    Ok(exit_code_for(&record))
}

async fn prompt_confirm(command: &str) -> anyhow::Result<bool> {
    let mut stderr = tokio::io::stderr();
    stderr
        .write_all(format!("Run '{}'? [y/N] ", command).as_bytes())
        .await?;
    stderr.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// 보안 거부(만료, 토큰 불일치)는 종료 코드로, 나머지는 에러로 돌려준다
fn gate_failure(err: GateError) -> anyhow::Result<u8> {
    if err.is_security_error() {
        eprintln!("✗ {}", err.user_message());
        Ok(EXIT_REFUSED)
    } else {
        Err(anyhow!(err.user_message()))
    }
}

/// 사용자에게 보여줄 에러면 한 줄 메시지와 종료 코드, 아니면 None
pub fn report_error(err: &anyhow::Error) -> Option<u8> {
    let err = err.downcast_ref::<Error>().filter(|e| e.is_user_facing())?;
    eprintln!("✗ {}", err);
    Some(match err {
        Error::Refused(_) | Error::ConfirmationExpired(_) => EXIT_REFUSED,
        Error::Timeout { .. } => EXIT_TIMEOUT,
        Error::Cancelled => EXIT_CANCELLED,
        _ => EXIT_FAILURE,
    })
}

fn exit_code_for(record: &ExecutionRecord) -> u8 {
    match record.status {
        ExecutionStatus::Executed | ExecutionStatus::Failed => match record.exit_code {
            Some(code) if (0..=255).contains(&code) => code as u8,
            _ => EXIT_FAILURE,
        },
        ExecutionStatus::Refused | ExecutionStatus::AwaitingConfirmation => EXIT_REFUSED,
        ExecutionStatus::TimedOut => EXIT_TIMEOUT,
        ExecutionStatus::Cancelled => EXIT_CANCELLED,
    }
}

fn print_verdict(verdict: &RiskVerdict) {
    println!("{} (score {}, {})", verdict.level(), verdict.score(), verdict.source());
    for reason in verdict.reasons() {
        println!("  - {}", reason);
    }
}

fn print_record(record: &ExecutionRecord) {
    match record.status {
        ExecutionStatus::Executed | ExecutionStatus::Failed => {
            if let Some(out) = &record.stdout {
                print!("{}", out);
            }
            if let Some(err) = &record.stderr {
                eprint!("{}", err);
            }
        }
        ExecutionStatus::Refused | ExecutionStatus::TimedOut | ExecutionStatus::Cancelled => {
            if let Some(partial) = &record.partial_output {
                print!("{}", partial);
            }
            if let Err(e) = record.clone().into_result() {
                eprintln!("✗ {}", e.user_message());
            }
        }
        ExecutionStatus::AwaitingConfirmation => {
            eprintln!("Awaiting confirmation ({})", record.id);
        }
    }
}

// ============================================================================
// services / invoke
// ============================================================================

pub fn services(session: &Session, capability: Option<&str>) -> anyhow::Result<u8> {
    let manager = session.manager()?;
    let list = match capability {
        Some(tag) => manager.get_services_by_capability(tag),
        None => manager.list_services(),
    };

    if session.json {
        session.print_json(&list)?;
        return Ok(0);
    }

    if list.is_empty() {
        println!("No services found.");
        return Ok(0);
    }

    println!("{:<20} {:<10} {}", "NAME", "TYPE", "CAPABILITIES");
    println!("{}", "-".repeat(72));
    for service in &list {
        println!(
            "{:<20} {:<10} {}",
            service.name,
            service.kind().unwrap_or("-"),
            service.capabilities.join(", ")
        );
    }
    Ok(0)
}

pub async fn invoke(session: &Session, name: &str, args: &str) -> anyhow::Result<u8> {
    let args: Value = serde_json::from_str(args).context("--args must be valid JSON")?;
    let manager = session.manager()?;
    let output = manager.invoke(name, args).await?;

    session.print_json(&output.data)?;
    Ok(if output.success { 0 } else { EXIT_FAILURE })
}

// ============================================================================
// register / deregister / snapshot
// ============================================================================

pub fn register(
    session: &Session,
    name: &str,
    description: &str,
    capabilities: Vec<String>,
    metadata: &[String],
) -> anyhow::Result<u8> {
    if !session.use_snapshot {
        bail!("register needs the registry snapshot; drop --no-snapshot");
    }
    let metadata = parse_metadata(metadata)?;
    let manager = session.manager()?;

    let outcome = manager.register_custom_service(name, description, capabilities, metadata)?;
    manager.save_snapshot()?;

    if session.json {
        session.print_json(&manager.get_service(name)?)?;
    } else {
        println!("✓ {:?} '{}'", outcome, name);
    }
    Ok(0)
}

pub fn deregister(session: &Session, name: &str) -> anyhow::Result<u8> {
    if !session.use_snapshot {
        bail!("deregister needs the registry snapshot; drop --no-snapshot");
    }
    let manager = session.manager()?;
    let removed: ServiceDescriptor = manager.deregister(name)?;
    manager.save_snapshot()?;
    println!("✓ Removed '{}'", removed.name);
    Ok(0)
}

pub fn snapshot(session: &Session) -> anyhow::Result<u8> {
    if !session.use_snapshot {
        bail!("snapshot is disabled by --no-snapshot");
    }
    let manager = session.manager()?;
    manager.save_snapshot()?;
    if let Some(path) = manager.snapshot_path() {
        println!("✓ {} services -> {}", manager.list_services().len(), path.display());
    }
    Ok(0)
}

/// `key=value` pairs; values become bool, integer, float or text
fn parse_metadata(entries: &[String]) -> anyhow::Result<BTreeMap<String, MetadataValue>> {
    let mut metadata = BTreeMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("metadata must be key=value, got '{}'", entry);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("metadata key is empty in '{}'", entry);
        }
        metadata.insert(key.to_string(), parse_value(value.trim()));
    }
    Ok(metadata)
}

fn parse_value(raw: &str) -> MetadataValue {
    if let Ok(b) = raw.parse::<bool>() {
        MetadataValue::from(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        MetadataValue::from(i)
    } else if let Ok(x) = raw.parse::<f64>() {
        MetadataValue::from(x)
    } else {
        MetadataValue::from(raw)
    }
}
