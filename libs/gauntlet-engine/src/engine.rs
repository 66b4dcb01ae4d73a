/// Execution Invoker - Runs a Built Container Command
///
/// **Core Responsibility:**
/// Spawn the guarded command, wait for it, capture exit status and both streams.
///
/// **Critical Architectural Boundary:**
/// - The invoker does NOT interpret output
/// - Passing, failing, crashing and timing out are all just an `ExecutionOutcome`
/// - The only thing it adds is the guard marker line when the wall-clock guard
///   fired, so the normalizer can recognise a timeout
///
/// The `timeout -s KILL` wrapper is the primary limit. A host-side backstop
/// (limit + grace) kills the child if the guard itself never returns.

use crate::command::ContainerCommand;
use async_trait::async_trait;
use gauntlet_common::types::ExecutionOutcome;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit status of a process terminated by SIGKILL
pub const SIGKILL_EXIT_CODE: i32 = 128 + 9;

/// Extra time the host waits beyond the guard before killing the child itself
const BACKSTOP_GRACE: Duration = Duration::from_secs(5);

const CONTAINER_REMOVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bytes kept per output stream; the rest is read and discarded
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024; // 1MB

/// Marker appended to stderr when the wall-clock guard killed the run
pub fn guard_marker(time_limit_secs: u64) -> String {
    format!(
        "Command killed by wall-clock guard (timeout -s KILL {}s)",
        time_limit_secs
    )
}

/// Runs container commands. Swappable so the orchestrator can be tested
/// without a container runtime.
#[async_trait]
pub trait CommandInvoker: Send + Sync {
    async fn invoke(&self, command: &ContainerCommand) -> io::Result<ExecutionOutcome>;
}

/// Invoker backed by real OS processes
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    grace: Duration,
    output_limit: usize,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self {
            grace: BACKSTOP_GRACE,
            output_limit: MAX_OUTPUT_BYTES,
        }
    }
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the backstop grace period
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Override how many bytes of each stream are kept
    pub fn with_output_limit(mut self, output_limit: usize) -> Self {
        self.output_limit = output_limit;
        self
    }
}

#[async_trait]
impl CommandInvoker for ProcessInvoker {
    async fn invoke(&self, command: &ContainerCommand) -> io::Result<ExecutionOutcome> {
        let limit = Duration::from_secs(command.time_limit_secs);

        // The guard's clock starts inside the child, so start ours first
        let start = Instant::now();

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let output_limit = self.output_limit;

        let run = async {
            let (status, stdout, stderr) = tokio::join!(
                child.wait(),
                read_capped(stdout, output_limit),
                read_capped(stderr, output_limit)
            );
            Ok::<_, io::Error>((status?, stdout?, stderr?))
        };

        let waited = tokio::time::timeout(limit + self.grace, run).await;
        let elapsed = start.elapsed();

        let mut outcome = match waited {
            Ok(finished) => {
                let (status, stdout, stderr) = finished?;
                ExecutionOutcome {
                    exit_code: exit_code(status),
                    stdout: stdout.into_text(output_limit),
                    stderr: stderr.into_text(output_limit),
                }
            }
            Err(_) => {
                warn!(
                    time_limit_secs = command.time_limit_secs,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Wall-clock guard did not fire, killed by backstop"
                );
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "Child already gone at backstop");
                }
                ExecutionOutcome {
                    exit_code: SIGKILL_EXIT_CODE,
                    stdout: String::new(),
                    stderr: String::new(),
                }
            }
        };

        if outcome.exit_code == SIGKILL_EXIT_CODE && elapsed >= limit {
            mark_guard_kill(&mut outcome, command.time_limit_secs);
            remove_container(command).await;
        }

        debug!(
            exit_code = outcome.exit_code,
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_bytes = outcome.stdout.len(),
            stderr_bytes = outcome.stderr.len(),
            "Container command finished"
        );

        Ok(outcome)
    }
}

/// Bytes kept from one output stream
struct CapturedStream {
    bytes: Vec<u8>,
    discarded: u64,
}

impl CapturedStream {
    fn into_text(self, output_limit: usize) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.discarded > 0 {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!(
                "[output truncated: kept {} bytes, discarded {}]\n",
                output_limit, self.discarded
            ));
        }
        text
    }
}

/// Keep the first `output_limit` bytes, then drain the pipe so the child never blocks on it
async fn read_capped<R>(pipe: Option<R>, output_limit: usize) -> io::Result<CapturedStream>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(CapturedStream {
            bytes: Vec::new(),
            discarded: 0,
        });
    };

    let mut bytes = Vec::new();
    (&mut pipe)
        .take(output_limit as u64)
        .read_to_end(&mut bytes)
        .await?;
    let discarded = tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;

    Ok(CapturedStream { bytes, discarded })
}

/// Killing the runtime client does not stop the container it started
async fn remove_container(command: &ContainerCommand) {
    if command.container_name.is_empty() {
        return;
    }

    let removed = Command::new(&command.runtime)
        .args(["rm", "-f", command.container_name.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(CONTAINER_REMOVE_TIMEOUT, removed).await {
        Ok(Ok(output)) if output.status.success() => {
            debug!(container = %command.container_name, "Removed timed-out container");
        }
        Ok(Ok(output)) => {
            // Already gone when --rm won the race
            debug!(
                container = %command.container_name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Container not removed"
            );
        }
        Ok(Err(e)) => {
            warn!(container = %command.container_name, error = %e, "Failed to remove timed-out container");
        }
        Err(_) => {
            warn!(container = %command.container_name, "Timed out removing container");
        }
    }
}

fn mark_guard_kill(outcome: &mut ExecutionOutcome, time_limit_secs: u64) {
    if !outcome.stderr.is_empty() && !outcome.stderr.ends_with('\n') {
        outcome.stderr.push('\n');
    }
    outcome.stderr.push_str(&guard_marker(time_limit_secs));
    outcome.stderr.push('\n');
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every command and replays a canned outcome
    pub struct RecordingInvoker {
        pub outcome: io::Result<ExecutionOutcome>,
        pub calls: Mutex<Vec<ContainerCommand>>,
    }

    impl RecordingInvoker {
        pub fn returning(exit_code: i32, stdout: &str, stderr: &str) -> Self {
            Self {
                outcome: Ok(ExecutionOutcome {
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                outcome: Err(io::Error::new(io::ErrorKind::NotFound, "timeout: not found")),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandInvoker for RecordingInvoker {
        async fn invoke(&self, command: &ContainerCommand) -> io::Result<ExecutionOutcome> {
            self.calls.lock().unwrap().push(command.clone());
            match &self.outcome {
                Ok(outcome) => Ok(outcome.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn command(program: &str, args: &[&str], time_limit_secs: u64) -> ContainerCommand {
        ContainerCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            time_limit_secs,
            // `true` stands in for the runtime so cleanup is a harmless no-op
            runtime: "true".to_string(),
            container_name: "gauntlet-test".to_string(),
        }
    }

    fn shell(script: &str, time_limit_secs: u64) -> ContainerCommand {
        command("sh", &["-c", script], time_limit_secs)
    }

    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let invoker = ProcessInvoker::new();
        let outcome = invoker
            .invoke(&shell("echo out; echo err >&2; exit 3", 10))
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let invoker = ProcessInvoker::new();
        let outcome = invoker
            .invoke(&command("echo", &["$(id)", "; rm -rf /"], 10))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout, "$(id) ; rm -rf /\n");
    }

    #[tokio::test]
    async fn test_guard_kill_is_marked() {
        let invoker = ProcessInvoker::new();
        let outcome = invoker
            .invoke(&command("timeout", &["-s", "KILL", "1s", "sleep", "10"], 1))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, SIGKILL_EXIT_CODE);
        assert!(outcome.stderr.contains(&guard_marker(1)));
    }

    #[tokio::test]
    async fn test_backstop_kills_runaway_child() {
        let invoker = ProcessInvoker::new().with_grace(Duration::from_millis(200));
        let start = Instant::now();

        let outcome = invoker.invoke(&shell("sleep 30", 1)).await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.exit_code, SIGKILL_EXIT_CODE);
        assert!(outcome.stderr.contains("timeout -s KILL"));
    }

    #[tokio::test]
    async fn test_fast_sigkill_is_not_a_timeout() {
        let invoker = ProcessInvoker::new();
        let outcome = invoker.invoke(&shell("kill -9 $$", 10)).await.unwrap();

        assert_eq!(outcome.exit_code, SIGKILL_EXIT_CODE);
        assert!(!outcome.stderr.contains("timeout -s KILL"));
    }

    #[tokio::test]
    async fn test_output_is_capped_per_stream() {
        let invoker = ProcessInvoker::new().with_output_limit(4096);
        let outcome = invoker
            .invoke(&shell("head -c 3000000 /dev/zero | tr '\\0' x; echo done >&2", 10))
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stdout.starts_with(&"x".repeat(4096)));
        assert!(outcome.stdout.len() < 4096 + 100);
        assert!(outcome.stdout.contains("[output truncated: kept 4096 bytes, discarded 2995904]"));
        assert_eq!(outcome.stderr, "done\n");
    }

    #[tokio::test]
    async fn test_default_output_limit() {
        let invoker = ProcessInvoker::new();
        let outcome = invoker
            .invoke(&shell("head -c 3000000 /dev/zero", 10))
            .await
            .unwrap();

        assert!(outcome.stdout.len() < MAX_OUTPUT_BYTES + 100);
        assert!(outcome.stdout.contains("[output truncated"));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let invoker = ProcessInvoker::new();
        let missing = command("gauntlet-definitely-not-installed", &[], 1);
        assert!(invoker.invoke(&missing).await.is_err());
    }
}
