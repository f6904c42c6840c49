//! Process execution gateway.
//!
//! Every external invocation in the crate goes through [`Gateway`]. A
//! non-zero exit is returned as data; classification is left to the caller.
//! Only a failure to start the process surfaces as [`GatewayError`].

use crate::domain::{ExecutionFailure, GatewayError};
use crate::infra::shell;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
    pub env: Vec<(String, String)>,
}

/// One external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub options: CommandOptions,
}

impl CommandRequest {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            options: CommandOptions::default(),
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(dir.into());
        self
    }

    pub fn maybe_cwd(mut self, dir: Option<PathBuf>) -> Self {
        self.options.cwd = dir;
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.options.stdin = Some(input.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.push((key.into(), value.into()));
        self
    }

    /// Command line for log output.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit code and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The text a user should see for a failure: stderr, or stdout when the
    /// tool wrote nothing to stderr.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim_end();
        if stderr.is_empty() {
            self.stdout.trim_end().to_string()
        } else {
            stderr.to_string()
        }
    }

    /// Both streams together, for pattern searches that must not care which
    /// stream git chose.
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    pub fn into_checked(self) -> Result<Self, ExecutionFailure> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecutionFailure {
                exit_code: self.exit_code,
                diagnostic: self.diagnostic(),
            })
        }
    }
}

/// Executes a request and captures its output.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    async fn execute(&self, request: CommandRequest) -> Result<CommandResult, GatewayError>;
}

/// Runs real processes through `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

#[async_trait]
impl ProcessHost for SystemHost {
    async fn execute(&self, request: CommandRequest) -> Result<CommandResult, GatewayError> {
        let program = shell::find_bin(&request.program)
            .ok_or_else(|| GatewayError::MissingBinary(request.program.clone()))?;

        let mut command = Command::new(&program);
        command
            .args(&request.args)
            .stdin(if request.options.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &request.options.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &request.options.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| GatewayError::Spawn {
            program: request.program.clone(),
            source,
        })?;

        if let Some(input) = &request.options.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|source| GatewayError::Stdin {
                    program: request.program.clone(),
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| GatewayError::Spawn {
                program: request.program.clone(),
                source,
            })?;

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Entry point for running external commands.
#[derive(Clone)]
pub struct Gateway {
    host: Arc<dyn ProcessHost>,
}

impl Gateway {
    pub fn new(host: Arc<dyn ProcessHost>) -> Self {
        Self { host }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemHost))
    }

    /// Run one command and wait for it.
    pub async fn run(&self, request: CommandRequest) -> Result<CommandResult, GatewayError> {
        log::debug!("run: {}", request.display());
        let result = self.host.execute(request).await;
        if let Ok(result) = &result
            && !result.success()
        {
            log::debug!("exit {}: {}", result.exit_code, result.diagnostic());
        }
        result
    }

    /// Run one command in the background and hand the result to
    /// `on_complete`. Returns immediately.
    pub fn submit<F>(&self, request: CommandRequest, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<CommandResult, GatewayError>) + Send + 'static,
    {
        let gateway = self.clone();
        tokio::spawn(async move {
            let result = gateway.run(request).await;
            on_complete(result);
        })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

struct ScriptedRule {
    args: Vec<String>,
    result: CommandResult,
    gate: Option<Arc<Notify>>,
}

impl ScriptedRule {
    fn matches(&self, request: &CommandRequest) -> bool {
        self.args.iter().all(|arg| request.args.contains(arg))
    }
}

/// In-memory host that answers from canned responses.
///
/// A rule matches a request when every one of its arguments appears in the
/// request's argv; the most recently added matching rule wins. Unmatched
/// requests exit 127. Used by the test suite and for dry runs.
#[derive(Default)]
pub struct ScriptedHost {
    rules: Mutex<Vec<ScriptedRule>>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl ScriptedHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, args: &[&str], result: CommandResult) {
        self.push_rule(args, result, None);
    }

    /// Like [`respond`](Self::respond), but the response is held back until
    /// `gate` is notified. Lets tests complete requests out of order.
    pub fn respond_after(&self, args: &[&str], result: CommandResult, gate: Arc<Notify>) {
        self.push_rule(args, result, Some(gate));
    }

    fn push_rule(&self, args: &[&str], result: CommandResult, gate: Option<Arc<Notify>>) {
        self.rules.lock().push(ScriptedRule {
            args: args.iter().map(|a| a.to_string()).collect(),
            result,
            gate,
        });
    }

    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().clone()
    }

    /// Whether any recorded call contained all of `args`.
    pub fn invoked(&self, args: &[&str]) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|call| args.iter().all(|a| call.args.iter().any(|c| c == a)))
    }
}

#[async_trait]
impl ProcessHost for ScriptedHost {
    async fn execute(&self, request: CommandRequest) -> Result<CommandResult, GatewayError> {
        self.calls.lock().push(request.clone());
        let matched = self
            .rules
            .lock()
            .iter()
            .rev()
            .find(|rule| rule.matches(&request))
            .map(|rule| (rule.result.clone(), rule.gate.clone()));

        match matched {
            Some((result, gate)) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok(result)
            }
            None => Ok(CommandResult::failed(
                127,
                format!("no scripted response for `{}`", request.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let result = CommandResult {
            exit_code: 1,
            stdout: "CONFLICT (content): Merge conflict in a.txt\n".into(),
            stderr: "error: could not apply abc123\n".into(),
        };
        assert_eq!(result.diagnostic(), "error: could not apply abc123");

        let quiet = CommandResult::failed(1, "").with_stdout("only stdout\n");
        assert_eq!(quiet.diagnostic(), "only stdout");
    }

    #[test]
    fn test_into_checked_keeps_diagnostic_verbatim() {
        let err = CommandResult::failed(128, "fatal: not a git repository\n")
            .into_checked()
            .unwrap_err();
        assert_eq!(err.exit_code, 128);
        assert_eq!(err.diagnostic, "fatal: not a git repository");
        assert!(CommandResult::ok("x").into_checked().is_ok());
    }

    #[test]
    fn test_request_display() {
        let request = CommandRequest::new("git", ["bisect", "good", "HEAD~3"]);
        assert_eq!(request.display(), "git bisect good HEAD~3");
    }

    #[tokio::test]
    async fn test_scripted_host_latest_rule_wins() {
        let host = ScriptedHost::new();
        host.respond(&["fetch"], CommandResult::ok("first"));
        host.respond(&["fetch"], CommandResult::ok("second"));
        let gateway = Gateway::new(host.clone());

        let result = gateway
            .run(CommandRequest::new("git", ["fetch", "origin"]))
            .await
            .unwrap();
        assert_eq!(result.stdout, "second");
        assert!(host.invoked(&["fetch", "origin"]));
        assert!(!host.invoked(&["push"]));
    }

    #[tokio::test]
    async fn test_scripted_host_unmatched_exits_127() {
        let gateway = Gateway::new(ScriptedHost::new());
        let result = gateway
            .run(CommandRequest::new("git", ["status"]))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 127);
    }

    #[tokio::test]
    async fn test_submit_delivers_through_callback() {
        let host = ScriptedHost::new();
        host.respond(&["log"], CommandResult::ok("abc\tsubject\n"));
        let gateway = Gateway::new(host);
        let (tx, rx) = tokio::sync::oneshot::channel();

        let handle = gateway.submit(CommandRequest::new("git", ["log"]), move |result| {
            let _ = tx.send(result);
        });
        handle.await.unwrap();

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result.stdout, "abc\tsubject\n");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_system_host_returns_nonzero_exit_as_data() {
        let gateway = Gateway::system();
        let result = gateway
            .run(CommandRequest::new(
                "sh",
                ["-c", "printf out; printf err >&2; exit 3"],
            ))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out");
        assert_eq!(result.stderr, "err");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_system_host_pipes_stdin_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Gateway::system();

        let echoed = gateway
            .run(CommandRequest::new("sh", ["-c", "cat"]).stdin("payload"))
            .await
            .unwrap();
        assert_eq!(echoed.stdout, "payload");

        let cwd = gateway
            .run(CommandRequest::new("sh", ["-c", "pwd -P"]).cwd(dir.path()))
            .await
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(cwd.stdout.trim(), expected.to_string_lossy());
    }

    #[tokio::test]
    async fn test_system_host_missing_binary() {
        let gateway = Gateway::system();
        let err = gateway
            .run(CommandRequest::new("gitweave_missing_binary_12345", ["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MissingBinary(_)));
    }
}
