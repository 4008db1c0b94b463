//! Scripted command runner for deterministic testing.
//!
//! Returns pre-queued results without spawning any processes, and records
//! every invocation for assertions.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::runner::{CommandOutput, CommandRunner, ExecOptions};
use baton_core::{BatonError, Result};

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

/// A command runner that replays a queue of scripted results.
///
/// # Example
/// ```
/// use baton_exec::ScriptedRunner;
/// let runner = ScriptedRunner::new().with_output("ok");
/// ```
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    results: Arc<Mutex<VecDeque<Result<CommandOutput>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    /// When `Some`, only these binaries resolve via `which`.
    installed: Arc<Mutex<Option<HashSet<String>>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful invocation with the given stdout.
    pub fn with_output(self, stdout: &str) -> Self {
        self.results.lock().push_back(Ok(CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(5),
        }));
        self
    }

    /// Queue a non-zero exit with the given stderr.
    pub fn with_exit(self, exit_code: i32, stderr: &str) -> Self {
        self.results.lock().push_back(Ok(CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
            duration: Duration::from_millis(5),
        }));
        self
    }

    /// Queue an execution error.
    pub fn with_error(self, error: BatonError) -> Self {
        self.results.lock().push_back(Err(error));
        self
    }

    /// Restrict `which` to the given binaries. Without this call every
    /// binary resolves.
    pub fn with_installed(self, binaries: &[&str]) -> Self {
        let set: HashSet<String> = binaries.iter().map(|b| b.to_string()).collect();
        *self.installed.lock() = Some(set);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        opts: &ExecOptions,
    ) -> Result<CommandOutput> {
        self.calls.lock().push(RecordedCall {
            program: program.to_string(),
            args: args.to_vec(),
            stdin: opts.stdin.clone(),
        });

        match self.results.lock().pop_front() {
            Some(result) => result,
            None => Ok(CommandOutput {
                stdout: "(scripted: no more queued results)".to_string(),
                stderr: String::new(),
                exit_code: 0,
                duration: Duration::from_millis(1),
            }),
        }
    }

    fn which(&self, binary: &str) -> Option<PathBuf> {
        match self.installed.lock().as_ref() {
            Some(set) if !set.contains(binary) => None,
            _ => Some(PathBuf::from(format!("/usr/local/bin/{binary}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_results_in_order() {
        let runner = ScriptedRunner::new()
            .with_output("first")
            .with_exit(1, "boom");

        let out = runner
            .execute("claude", &[], &ExecOptions::default())
            .await
            .unwrap();
        assert_eq!(out.stdout, "first");

        let out = runner
            .execute("claude", &[], &ExecOptions::default())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
        assert_eq!(out.stderr, "boom");
    }

    #[tokio::test]
    async fn records_calls_with_stdin() {
        let runner = ScriptedRunner::new().with_output("ok");
        let opts = ExecOptions {
            stdin: Some("prompt text".into()),
            ..Default::default()
        };
        runner
            .execute("cursor-agent", &["-p".into()], &opts)
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "cursor-agent");
        assert_eq!(calls[0].stdin.as_deref(), Some("prompt text"));
    }

    #[test]
    fn which_respects_installed_set() {
        let runner = ScriptedRunner::new().with_installed(&["claude"]);
        assert!(runner.which("claude").is_some());
        assert!(runner.which("gemini").is_none());

        let open = ScriptedRunner::new();
        assert!(open.which("anything").is_some());
    }
}
