//! Interactive rebase: the editable instruction list and the session that
//! hands it to git.

use super::inbox::{GatewayResult, Inbox};
use super::staleness::{StalenessGuard, Stamp, Stamped};
use crate::domain::{RebaseAction, RebaseEntry, RebaseError};
use crate::infra::git::Git;
use crate::infra::process::{CommandRequest, CommandResult, Gateway};
use serde::Serialize;
use std::str::FromStr;

// git accepts abbreviations down to four characters.
const MIN_SHA_LEN: usize = 4;

// Output that means git paused the rebase and is waiting for the user.
const STOP_MARKERS: &[&str] = &[
    "CONFLICT",
    "could not apply",
    "Stopped at",
    "You can amend the commit now",
];

/// Parse `<sha>\t<subject>` lines, as printed by `git log --format=%H%x09%s`.
/// Plain whitespace between sha and subject is accepted too. Lines without a
/// hex sha are skipped. Input order is kept.
pub fn parse_commits(raw: &str) -> Vec<RebaseEntry> {
    raw.lines().filter_map(parse_commit_line).collect()
}

fn parse_commit_line(line: &str) -> Option<RebaseEntry> {
    let line = line.trim_end_matches('\r');
    let (sha, subject) = match line.split_once('\t') {
        Some((sha, subject)) => (sha.trim(), subject),
        None => {
            let line = line.trim_start();
            line.split_once(char::is_whitespace)
                .map(|(sha, subject)| (sha, subject.trim_start()))
                .unwrap_or((line, ""))
        }
    };

    if sha.len() < MIN_SHA_LEN || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(RebaseEntry::new(sha, subject))
}

/// The instruction script git reads: one `<action> <sha> <subject>` line per
/// entry, in list order.
pub fn build_todo(entries: &[RebaseEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.todo_line() + "\n")
        .collect()
}

/// Ordered, editable list of commits to rebase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebaseTodo {
    entries: Vec<RebaseEntry>,
}

impl RebaseTodo {
    pub fn new(entries: Vec<RebaseEntry>) -> Self {
        Self { entries }
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(parse_commits(raw))
    }

    pub fn entries(&self) -> &[RebaseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_action(&mut self, index: usize, action: RebaseAction) -> Result<(), RebaseError> {
        self.entry_mut(index)?.action = action;
        Ok(())
    }

    /// Like [`set_action`](Self::set_action), for an action name typed by
    /// the user.
    pub fn set_action_str(&mut self, index: usize, action: &str) -> Result<(), RebaseError> {
        let action = RebaseAction::from_str(action)?;
        self.set_action(index, action)
    }

    /// Swap the entry with the one above it. Returns its new index; the top
    /// entry stays put.
    pub fn move_up(&mut self, index: usize) -> Result<usize, RebaseError> {
        self.check_index(index)?;
        if index == 0 {
            return Ok(0);
        }
        self.entries.swap(index - 1, index);
        Ok(index - 1)
    }

    /// Swap the entry with the one below it. Returns its new index; the last
    /// entry stays put.
    pub fn move_down(&mut self, index: usize) -> Result<usize, RebaseError> {
        self.check_index(index)?;
        if index + 1 == self.entries.len() {
            return Ok(index);
        }
        self.entries.swap(index, index + 1);
        Ok(index + 1)
    }

    pub fn build(&self) -> String {
        build_todo(&self.entries)
    }

    /// Squash or fixup on the first kept commit has nothing to fold into;
    /// git would reject the whole script.
    pub fn validate(&self) -> Result<(), RebaseError> {
        match self
            .entries
            .iter()
            .find(|entry| entry.action != RebaseAction::Drop)
        {
            Some(first) if first.action.folds_into_previous() => {
                Err(RebaseError::NothingToFoldInto(first.action))
            }
            _ => Ok(()),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), RebaseError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(RebaseError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
        }
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut RebaseEntry, RebaseError> {
        self.check_index(index)?;
        Ok(&mut self.entries[index])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RebaseStep {
    Apply,
    Continue,
    Abort,
}

#[derive(Debug)]
enum RebaseMessage {
    Loaded(GatewayResult),
    Ran { step: RebaseStep, result: GatewayResult },
}

/// What a finished git call did to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RebaseEvent {
    Loaded { commits: usize },
    Completed,
    /// git paused for a conflict or an `edit` stop.
    Stopped { diagnostic: String },
    Aborted,
    Failed { diagnostic: String },
}

/// One interactive rebase onto a base ref, from loading the commit list
/// until git finishes or the user aborts.
pub struct RebaseSession {
    gateway: Gateway,
    git: Git,
    guard: StalenessGuard<String>,
    inbox: Inbox<String, RebaseMessage>,
    todo: Option<RebaseTodo>,
}

impl RebaseSession {
    pub fn new(gateway: Gateway, git: Git) -> Self {
        Self {
            gateway,
            git,
            guard: StalenessGuard::new(),
            inbox: Inbox::new(),
            todo: None,
        }
    }

    /// Load `base..HEAD`. Any earlier session is abandoned.
    pub fn start(&mut self, base: &str) {
        let stamp = self.guard.open(base.to_string());
        log::info!("rebase session onto {base} ({})", stamp.generation);
        self.todo = None;
        let request = self.git.log_for_rebase(base);
        self.inbox
            .dispatch(&self.gateway, request, stamp, RebaseMessage::Loaded);
    }

    /// Run `git rebase -i` with the current instruction list.
    ///
    /// `reword` and `squash` messages go through the editor set with
    /// [`Git::with_editor`]; without one git's proposed message is kept.
    pub fn apply(&mut self) -> Result<(), RebaseError> {
        let stamp = self.guard.stamp().ok_or(RebaseError::SessionClosed)?;
        let todo = match &self.todo {
            Some(todo) if !todo.is_empty() => todo,
            _ => {
                return Err(RebaseError::NoCommits {
                    base: stamp.scope.clone(),
                });
            }
        };
        todo.validate()?;
        let request = self.git.rebase_interactive(&stamp.scope, &todo.build());
        self.run_step(RebaseStep::Apply, request, stamp);
        Ok(())
    }

    pub fn continue_rebase(&mut self) -> Result<(), RebaseError> {
        let stamp = self.guard.stamp().ok_or(RebaseError::SessionClosed)?;
        let request = self.git.rebase_continue();
        self.run_step(RebaseStep::Continue, request, stamp);
        Ok(())
    }

    /// Abort the rebase. Results of anything still running are ignored.
    pub fn abort(&mut self) -> Result<(), RebaseError> {
        let stamp = self.guard.invalidate().ok_or(RebaseError::SessionClosed)?;
        let request = self.git.rebase_abort();
        self.run_step(RebaseStep::Abort, request, stamp);
        Ok(())
    }

    fn run_step(&mut self, step: RebaseStep, request: CommandRequest, stamp: Stamp<String>) {
        self.inbox
            .dispatch(&self.gateway, request, stamp, move |result| {
                RebaseMessage::Ran { step, result }
            });
    }

    pub fn poll(&mut self) -> Vec<RebaseEvent> {
        let mut events = Vec::new();
        while let Some(msg) = self.inbox.try_next() {
            events.extend(self.apply_message(msg));
        }
        events
    }

    pub async fn wait_next(&mut self) -> Option<RebaseEvent> {
        let msg = self.inbox.next().await?;
        self.apply_message(msg)
    }

    fn apply_message(&mut self, msg: Stamped<String, RebaseMessage>) -> Option<RebaseEvent> {
        let base = msg.stamp.scope.clone();
        let message = self.guard.apply(msg, |message| message)?;
        let event = match message {
            RebaseMessage::Loaded(result) => match result {
                Ok(output) if output.success() => {
                    let todo = RebaseTodo::parse(&output.stdout);
                    let commits = todo.len();
                    self.todo = Some(todo);
                    if commits == 0 {
                        RebaseEvent::Failed {
                            diagnostic: RebaseError::NoCommits { base: base.clone() }.to_string(),
                        }
                    } else {
                        RebaseEvent::Loaded { commits }
                    }
                }
                Ok(output) => RebaseEvent::Failed {
                    diagnostic: output.diagnostic(),
                },
                Err(err) => RebaseEvent::Failed {
                    diagnostic: err.to_string(),
                },
            },
            RebaseMessage::Ran { step, result } => match result {
                Ok(output) => classify(step, &output),
                Err(err) => RebaseEvent::Failed {
                    diagnostic: err.to_string(),
                },
            },
        };

        if matches!(event, RebaseEvent::Completed | RebaseEvent::Aborted) {
            log::info!("rebase session onto {base} finished: {event:?}");
            self.guard.close();
            self.todo = None;
        }
        Some(event)
    }

    pub fn is_active(&self) -> bool {
        self.guard.is_open()
    }

    pub fn base(&self) -> Option<&str> {
        self.guard.scope().map(String::as_str)
    }

    pub fn todo(&self) -> Option<&RebaseTodo> {
        self.todo.as_ref()
    }

    pub fn todo_mut(&mut self) -> Option<&mut RebaseTodo> {
        self.todo.as_mut()
    }
}

fn classify(step: RebaseStep, output: &CommandResult) -> RebaseEvent {
    if step == RebaseStep::Abort {
        return if output.success() {
            RebaseEvent::Aborted
        } else {
            RebaseEvent::Failed {
                diagnostic: output.diagnostic(),
            }
        };
    }

    let combined = output.combined_output();
    if STOP_MARKERS.iter().any(|marker| combined.contains(marker)) {
        RebaseEvent::Stopped {
            diagnostic: output.diagnostic(),
        }
    } else if output.success() {
        RebaseEvent::Completed
    } else {
        RebaseEvent::Failed {
            diagnostic: output.diagnostic(),
        }
    }
}

/// Load the instruction list for `base..HEAD` without opening a session.
pub async fn load_todo(gateway: &Gateway, git: &Git, base: &str) -> Result<RebaseTodo, RebaseError> {
    let output = gateway.run(git.log_for_rebase(base)).await?.into_checked()?;
    Ok(RebaseTodo::parse(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::git::TODO_ENV;
    use crate::infra::process::ScriptedHost;
    use std::sync::Arc;
    use tokio::sync::Notify;

    const SHA_A: &str = "1111111111111111111111111111111111111111";
    const SHA_B: &str = "2222222222222222222222222222222222222222";

    fn log_output() -> String {
        format!("{SHA_A}\tAdd parser\n{SHA_B}\tFix typo in parser\n")
    }

    #[test]
    fn test_parse_commits_keeps_order() {
        let entries = parse_commits(&log_output());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sha, SHA_A);
        assert_eq!(entries[0].short_sha, "1111111");
        assert_eq!(entries[1].subject, "Fix typo in parser");
        assert!(entries.iter().all(|e| e.action == RebaseAction::Pick));
    }

    #[test]
    fn test_parse_commits_skips_malformed_lines() {
        let raw = "\nnot-a-sha\tsubject\nabcdef1 Subject with spaces\nzzzz\n";
        let entries = parse_commits(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sha, "abcdef1");
        assert_eq!(entries[0].subject, "Subject with spaces");
    }

    #[test]
    fn test_reorder_is_reflected_in_todo() {
        let mut todo = RebaseTodo::parse(&log_output());
        assert_eq!(todo.move_down(0).unwrap(), 1);
        todo.set_action(0, RebaseAction::Reword).unwrap();

        assert_eq!(
            todo.build(),
            format!("reword {SHA_B} Fix typo in parser\npick {SHA_A} Add parser\n")
        );
    }

    #[test]
    fn test_move_at_edges_is_noop() {
        let mut todo = RebaseTodo::parse(&log_output());
        assert_eq!(todo.move_up(0).unwrap(), 0);
        assert_eq!(todo.move_down(1).unwrap(), 1);
        assert_eq!(todo.entries()[0].sha, SHA_A);
        assert!(matches!(
            todo.move_up(2),
            Err(RebaseError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_set_action_str_validates() {
        let mut todo = RebaseTodo::parse(&log_output());
        todo.set_action_str(1, "f").unwrap();
        assert_eq!(todo.entries()[1].action, RebaseAction::Fixup);
        assert!(matches!(
            todo.set_action_str(1, "exec"),
            Err(RebaseError::UnknownAction(_))
        ));
        assert_eq!(todo.entries()[1].action, RebaseAction::Fixup);
    }

    #[test]
    fn test_validate_rejects_leading_squash() {
        let mut todo = RebaseTodo::parse(&log_output());
        todo.set_action(0, RebaseAction::Drop).unwrap();
        todo.set_action(1, RebaseAction::Squash).unwrap();
        assert!(matches!(
            todo.validate(),
            Err(RebaseError::NothingToFoldInto(RebaseAction::Squash))
        ));
    }

    #[tokio::test]
    async fn test_session_applies_edited_todo() {
        let host = ScriptedHost::new();
        host.respond(&["log"], CommandResult::ok(log_output()));
        host.respond(&["rebase", "-i", "main"], CommandResult::ok(""));
        let mut session = RebaseSession::new(Gateway::new(host.clone()), Git::default());

        session.start("main");
        assert_eq!(
            session.wait_next().await,
            Some(RebaseEvent::Loaded { commits: 2 })
        );
        session.todo_mut().unwrap().set_action(1, RebaseAction::Fixup).unwrap();
        session.apply().unwrap();
        assert_eq!(session.wait_next().await, Some(RebaseEvent::Completed));
        assert!(!session.is_active());

        let rebase = host
            .calls()
            .into_iter()
            .find(|call| call.args.contains(&"-i".to_string()))
            .unwrap();
        let todo = rebase
            .options
            .env
            .iter()
            .find(|(key, _)| key == TODO_ENV)
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(
            todo,
            format!("pick {SHA_A} Add parser\nfixup {SHA_B} Fix typo in parser\n")
        );
    }

    #[tokio::test]
    async fn test_conflict_stops_with_verbatim_diagnostic() {
        let host = ScriptedHost::new();
        host.respond(&["log"], CommandResult::ok(log_output()));
        host.respond(
            &["rebase", "-i"],
            CommandResult::failed(1, "error: could not apply 2222222... Fix typo in parser\n")
                .with_stdout("CONFLICT (content): Merge conflict in src/parser.rs\n"),
        );
        let mut session = RebaseSession::new(Gateway::new(host), Git::default());

        session.start("main");
        session.wait_next().await;
        session.apply().unwrap();
        assert_eq!(
            session.wait_next().await,
            Some(RebaseEvent::Stopped {
                diagnostic: "error: could not apply 2222222... Fix typo in parser".into()
            })
        );
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_abort_supersedes_running_apply() {
        let host = ScriptedHost::new();
        let gate = Arc::new(Notify::new());
        host.respond(&["log"], CommandResult::ok(log_output()));
        host.respond_after(&["rebase", "-i"], CommandResult::ok(""), gate.clone());
        host.respond(&["rebase", "--abort"], CommandResult::ok(""));
        let mut session = RebaseSession::new(Gateway::new(host), Git::default());

        session.start("main");
        session.wait_next().await;
        session.apply().unwrap();
        session.abort().unwrap();

        assert_eq!(session.wait_next().await, Some(RebaseEvent::Aborted));
        gate.notify_one();
        assert_eq!(session.wait_next().await, None);
        assert!(!session.is_active());
        assert!(matches!(session.apply(), Err(RebaseError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_empty_range_reports_no_commits() {
        let host = ScriptedHost::new();
        host.respond(&["log"], CommandResult::ok(""));
        let mut session = RebaseSession::new(Gateway::new(host), Git::default());

        session.start("main");
        assert_eq!(
            session.wait_next().await,
            Some(RebaseEvent::Failed {
                diagnostic: "Nothing to rebase onto main".into()
            })
        );
        assert!(matches!(session.apply(), Err(RebaseError::NoCommits { .. })));
    }
}
