use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use baton_core::{BatonError, Result};

/// Options for a single subprocess invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Maximum wall-clock time; the child is killed when it elapses.
    pub timeout: Option<Duration>,
    /// Extra environment variables (inherited environment stays in place).
    pub env: HashMap<String, String>,
    /// Payload written to the child's stdin. When `None`, stdin is piped
    /// to /dev/null so interactive binaries fail fast instead of hanging.
    pub stdin: Option<String>,
    pub working_dir: Option<PathBuf>,
}

/// Result of a completed subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs agent binaries. Implemented by [`SystemRunner`] for real processes
/// and [`crate::ScriptedRunner`] for tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit.
    ///
    /// A non-zero exit is not an error; it comes back as a
    /// [`CommandOutput`] with the exit code set. Errors are reserved for
    /// timeouts and failures to run the process at all.
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        opts: &ExecOptions,
    ) -> Result<CommandOutput>;

    /// Locate `binary` on `PATH`.
    fn which(&self, binary: &str) -> Option<PathBuf>;
}

/// Tokio-backed process runner.
pub struct SystemRunner {
    default_timeout: Duration,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        opts: &ExecOptions,
    ) -> Result<CommandOutput> {
        let started = Instant::now();
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &opts.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &opts.working_dir {
            cmd.current_dir(dir);
        }

        debug!(program, ?args, timeout_secs = timeout.as_secs(), "spawning");

        let output = if let Some(input) = &opts.stdin {
            cmd.stdin(Stdio::piped());
            let mut child = cmd.spawn().map_err(|e| {
                BatonError::CommandExecution(format!("failed to spawn {program}: {e}"))
            })?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await.map_err(|e| {
                    BatonError::CommandExecution(format!("failed to write stdin to {program}: {e}"))
                })?;
                // Dropping the handle closes the pipe.
            }

            tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| timeout_error(program, timeout))?
                .map_err(|e| BatonError::CommandExecution(format!("{program} failed: {e}")))?
        } else {
            cmd.stdin(Stdio::null());
            tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| timeout_error(program, timeout))?
                .map_err(|e| {
                    BatonError::CommandExecution(format!("failed to run {program}: {e}"))
                })?
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: started.elapsed(),
        })
    }

    fn which(&self, binary: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(binary))
            .find(|candidate| is_executable(candidate))
    }
}

fn timeout_error(program: &str, timeout: Duration) -> BatonError {
    BatonError::Timeout(format!(
        "{program} timed out after {}s",
        timeout.as_secs()
    ))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && path
            .metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let runner = SystemRunner::new();
        let out = runner
            .execute(
                "sh",
                &["-c".into(), "echo hello; exit 3".into()],
                &ExecOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn pipes_stdin_payload() {
        let runner = SystemRunner::new();
        let opts = ExecOptions {
            stdin: Some("from stdin".into()),
            ..Default::default()
        };
        let out = runner
            .execute("cat", &[], &opts)
            .await
            .unwrap();
        assert_eq!(out.stdout, "from stdin");
        assert!(out.success());
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let runner = SystemRunner::new();
        let opts = ExecOptions {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let err = runner
            .execute("sleep", &["5".into()], &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, BatonError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_an_execution_error() {
        let runner = SystemRunner::new();
        let err = runner
            .execute("definitely-not-a-binary", &[], &ExecOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BatonError::CommandExecution(_)));
    }

    #[test]
    fn which_finds_common_binaries() {
        let runner = SystemRunner::new();
        assert!(runner.which("sh").is_some());
        assert!(runner.which("definitely-not-a-binary").is_none());
    }

    #[tokio::test]
    async fn env_vars_reach_the_child() {
        let runner = SystemRunner::new();
        let opts = ExecOptions {
            env: HashMap::from([("BATON_TEST_VAR".to_string(), "42".to_string())]),
            ..Default::default()
        };
        let out = runner
            .execute("sh", &["-c".into(), "echo $BATON_TEST_VAR".into()], &opts)
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "42");
    }
}
