//! Builders for the git invocations the workflows issue.
//!
//! Output is always requested in the C locale so the handful of messages we
//! parse ("is the first bad commit", "CONFLICT") are stable.

use crate::domain::BisectVerdict;
use crate::infra::process::CommandRequest;
use std::path::PathBuf;

/// Environment variable carrying the instruction script into the sequence
/// editor during an interactive rebase.
pub const TODO_ENV: &str = "GITWEAVE_REBASE_TODO";

// Git runs the sequence editor through the shell with the todo path
// appended, which lands in $1 here.
const SEQUENCE_EDITOR: &str = "sh -c 'printf \"%s\" \"$GITWEAVE_REBASE_TODO\" > \"$1\"' gitweave-sequence-editor";

// Message editor when none is configured: accept git's message as is.
const KEEP_MESSAGE_EDITOR: &str = "true";

#[derive(Debug, Clone)]
pub struct Git {
    program: String,
    cwd: Option<PathBuf>,
    editor: Option<String>,
}

impl Default for Git {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Git {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cwd: None,
            editor: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Editor git opens for `reword` and `squash` messages during a rebase.
    /// Without one the messages are kept unedited.
    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    fn message_editor(&self) -> &str {
        self.editor.as_deref().unwrap_or(KEEP_MESSAGE_EDITOR)
    }

    pub fn cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    pub fn command<I, S>(&self, args: I) -> CommandRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandRequest::new(self.program.clone(), args)
            .maybe_cwd(self.cwd.clone())
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
    }

    /// `git diff` against `target`, or the working tree when `target` is None.
    pub fn diff(&self, target: Option<&str>) -> CommandRequest {
        let mut args = vec!["diff", "--no-color", "--no-ext-diff", "-M"];
        args.extend(target);
        self.command(args)
    }

    /// Commits in `base..HEAD`, oldest first, as `<sha>\t<subject>` lines.
    pub fn log_for_rebase(&self, base: &str) -> CommandRequest {
        self.command([
            "log".to_string(),
            "--reverse".to_string(),
            "--no-color".to_string(),
            "--format=%H%x09%s".to_string(),
            format!("{base}..HEAD"),
        ])
    }

    pub fn rebase_interactive(&self, base: &str, todo: &str) -> CommandRequest {
        self.command(["rebase", "-i", base])
            .env("GIT_SEQUENCE_EDITOR", SEQUENCE_EDITOR)
            .env(TODO_ENV, todo)
            .env("GIT_EDITOR", self.message_editor())
    }

    pub fn rebase_continue(&self) -> CommandRequest {
        self.command(["rebase", "--continue"])
            .env("GIT_EDITOR", self.message_editor())
    }

    pub fn rebase_abort(&self) -> CommandRequest {
        self.command(["rebase", "--abort"])
    }

    pub fn bisect_start(&self, bad: &str, good: &str) -> CommandRequest {
        self.command(["bisect", "start", bad, good])
    }

    pub fn bisect_mark(&self, verdict: BisectVerdict, rev: &str) -> CommandRequest {
        let verdict = verdict.to_string();
        self.command(["bisect", verdict.as_str(), rev])
    }

    pub fn bisect_reset(&self) -> CommandRequest {
        self.command(["bisect", "reset"])
    }

    pub fn current_branch(&self) -> CommandRequest {
        self.command(["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn fetch(&self, remote: &str) -> CommandRequest {
        self.command(["fetch", remote])
    }

    pub fn pull(&self, remote: &str, branch: Option<&str>, rebase: bool) -> CommandRequest {
        let mut args = vec!["pull", if rebase { "--rebase" } else { "--no-rebase" }, remote];
        args.extend(branch);
        self.command(args)
    }

    /// Number of local commits missing upstream.
    pub fn ahead_count(&self) -> CommandRequest {
        self.command(["rev-list", "--count", "@{upstream}..HEAD"])
    }

    pub fn push(&self, remote: &str, branch: Option<&str>) -> CommandRequest {
        let mut args = vec!["push", remote];
        args.extend(branch);
        self.command(args)
    }
}

/// Parse the single integer `git rev-list --count` prints.
pub fn parse_count(stdout: &str) -> Option<u32> {
    stdout.trim().parse().ok()
}
