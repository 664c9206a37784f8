//! Shell process execution with timeout and cancellation
//!
//! Runs `<shell> -c <command>` with piped output. stdout/stderr are read
//! concurrently into shared buffers so output captured before a kill is
//! still available. On Unix the child leads its own process group and the
//! whole group is killed on timeout or cancellation.

use super::error::{GateError, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warden_foundation::ExecutionConfig;

/// Appended when output exceeds `max_output_size`
pub const TRUNCATION_MARKER: &str = "\n... [Output truncated]";

/// How long to wait for pipe readers after the process is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured process output
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// `None` when the process was killed by us
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// How the process ended
#[derive(Debug)]
pub enum ProcessOutcome {
    Completed(ProcessOutput),
    TimedOut(ProcessOutput),
    Cancelled(ProcessOutput),
}

enum Ended {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Spawns shell commands according to `ExecutionConfig`
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    config: ExecutionConfig,
}

impl ProcessExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run a command to completion, timeout or cancellation
    pub async fn run(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome> {
        let mut cmd = self.build_command(command, working_dir)?;

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| GateError::SpawnFailed(format!("{}: {}", self.config.shell, e)))?;
        let pid = child.id();
        debug!("[gate] spawned pid {:?}: {}", pid, command);

        // +1 so that overflow is detectable after decoding
        let cap = self.config.max_output_size.saturating_add(1);
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, Arc::clone(&stdout_buf), cap));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, Arc::clone(&stderr_buf), cap));
        }

        let ended = tokio::select! {
            status = child.wait() => Ended::Exited(status),
            _ = tokio::time::sleep(timeout) => Ended::TimedOut,
            _ = cancel.cancelled() => Ended::Cancelled,
        };

        if !matches!(ended, Ended::Exited(_)) {
            self.terminate(&mut child, pid).await;
        }

        for reader in readers {
            let abort = reader.abort_handle();
            if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
                // a detached descendant still holds the pipe
                abort.abort();
            }
        }

        let (stdout, stdout_truncated) = self.decode(&stdout_buf.lock());
        let (stderr, stderr_truncated) = self.decode(&stderr_buf.lock());
        let mut output = ProcessOutput {
            exit_code: None,
            stdout,
            stderr,
            truncated: stdout_truncated || stderr_truncated,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        Ok(match ended {
            Ended::Exited(status) => {
                let status = status?;
                output.exit_code = Some(exit_code(&status));
                ProcessOutcome::Completed(output)
            }
            Ended::TimedOut => ProcessOutcome::TimedOut(output),
            Ended::Cancelled => ProcessOutcome::Cancelled(output),
        })
    }

    fn build_command(&self, command: &str, working_dir: Option<&Path>) -> Result<Command> {
        let mut cmd = Command::new(&self.config.shell);
        cmd.arg(shell_flag(&self.config.shell))
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = working_dir {
            if !dir.is_dir() {
                return Err(GateError::WorkingDirectory(format!(
                    "{} is not a directory",
                    dir.display()
                )));
            }
            cmd.current_dir(dir);
        }

        for (key, _) in std::env::vars_os() {
            if let Some(name) = key.to_str() {
                if self.config.is_env_blocked(name) {
                    cmd.env_remove(name);
                }
            }
        }

        #[cfg(unix)]
        {
            if self.config.kill_process_group {
                cmd.process_group(0);
            }
        }

        Ok(cmd)
    }

    async fn terminate(&self, child: &mut Child, pid: Option<u32>) {
        #[cfg(unix)]
        {
            if self.config.kill_process_group {
                if let Some(pid) = pid {
                    // SAFETY: the child was spawned with process_group(0), so its
                    // pid is also the id of a group that contains only its tree.
                    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
                    if rc != 0 {
                        debug!("[gate] killpg({}) failed: {}", pid, std::io::Error::last_os_error());
                    }
                }
            }
        }
        #[cfg(not(unix))]
        let _ = pid;

        if let Err(e) = child.kill().await {
            warn!("[gate] failed to kill child process: {}", e);
        }
    }

    fn decode(&self, bytes: &[u8]) -> (String, bool) {
        let text = String::from_utf8_lossy(bytes);
        let text = if self.config.strip_ansi {
            strip_ansi_escapes::strip_str(&text)
        } else {
            text.into_owned()
        };
        truncate_output(&text, self.config.max_output_size)
    }
}

fn spawn_reader<R>(mut source: R, buffer: Arc<Mutex<Vec<u8>>>, cap: usize) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match source.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    // keep draining past the cap so the child never blocks on a full pipe
                    let mut out = buffer.lock();
                    let room = cap.saturating_sub(out.len());
                    out.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
    })
}

fn shell_flag(shell: &str) -> &'static str {
    let name = Path::new(shell)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(shell);
    if name.eq_ignore_ascii_case("cmd") {
        "/C"
    } else {
        "-c"
    }
}

fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Cut at `max` bytes (on a char boundary) and append the marker
pub fn truncate_output(output: &str, max: usize) -> (String, bool) {
    if output.len() <= max {
        return (output.to_string(), false);
    }
    let mut end = max;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    (format!("{}{}", &output[..end], TRUNCATION_MARKER), true)
}
