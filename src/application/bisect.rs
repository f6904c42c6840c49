//! Bisect session tracking on top of `git bisect`.

use super::inbox::{GatewayResult, Inbox};
use super::staleness::{StalenessGuard, Stamped};
use crate::domain::{BisectError, BisectProgress, BisectSession, BisectVerdict};
use crate::infra::git::Git;
use crate::infra::process::Gateway;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref FIRST_BAD_RE: Regex =
        Regex::new(r"\b([0-9a-f]{7,40}) is the first bad commit").expect("first bad regex");
    static ref REMAINING_RE: Regex =
        Regex::new(r"Bisecting: (\d+) revisions? left to test").expect("remaining regex");
    static ref CURRENT_RE: Regex =
        Regex::new(r"(?m)^\[([0-9a-f]{7,40})\] ").expect("current candidate regex");
}

/// The sha git names as the first bad commit, if the output says so.
pub fn parse_first_bad(output: &str) -> Option<String> {
    FIRST_BAD_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Revisions left to test, from a "Bisecting: N revisions left" line.
pub fn parse_remaining(output: &str) -> Option<u32> {
    REMAINING_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Commit git checked out for the next test, from its `[sha] subject` line.
pub fn parse_current(output: &str) -> Option<String> {
    CURRENT_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn parse_progress(output: &str) -> BisectProgress {
    BisectProgress {
        first_bad: parse_first_bad(output),
        remaining: parse_remaining(output),
        current: parse_current(output),
    }
}

#[derive(Debug)]
enum BisectMessage {
    Started(GatewayResult),
    Marked {
        verdict: BisectVerdict,
        result: GatewayResult,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BisectUpdate {
    Started(BisectProgress),
    Marked {
        verdict: BisectVerdict,
        progress: BisectProgress,
    },
    Failed {
        diagnostic: String,
    },
}

impl BisectUpdate {
    /// Whether this update isolated the first bad commit.
    pub fn found_first_bad(&self) -> bool {
        match self {
            Self::Started(progress) | Self::Marked { progress, .. } => progress.first_bad.is_some(),
            Self::Failed { .. } => false,
        }
    }
}

pub struct BisectTracker {
    gateway: Gateway,
    git: Git,
    guard: StalenessGuard<()>,
    inbox: Inbox<(), BisectMessage>,
    session: BisectSession,
}

impl BisectTracker {
    pub fn new(gateway: Gateway, git: Git) -> Self {
        Self {
            gateway,
            git,
            guard: StalenessGuard::new(),
            inbox: Inbox::new(),
            session: BisectSession::default(),
        }
    }

    /// Begin a search between `bad` and `good`. The session becomes active
    /// once git accepts the range.
    pub fn start(&mut self, bad: &str, good: &str) {
        let stamp = self.guard.open(());
        log::info!("bisect start bad={bad} good={good}");
        self.session = BisectSession {
            bad_ref: bad.to_string(),
            good_ref: good.to_string(),
            ..BisectSession::default()
        };
        let request = self.git.bisect_start(bad, good);
        self.inbox
            .dispatch(&self.gateway, request, stamp, BisectMessage::Started);
    }

    pub fn good(&mut self, rev: &str) -> Result<(), BisectError> {
        self.mark(BisectVerdict::Good, rev)
    }

    pub fn bad(&mut self, rev: &str) -> Result<(), BisectError> {
        self.mark(BisectVerdict::Bad, rev)
    }

    pub fn skip(&mut self, rev: &str) -> Result<(), BisectError> {
        self.mark(BisectVerdict::Skip, rev)
    }

    fn mark(&mut self, verdict: BisectVerdict, rev: &str) -> Result<(), BisectError> {
        let stamp = self
            .guard
            .stamp()
            .filter(|_| self.session.active)
            .ok_or(BisectError::NotActive)?;
        let request = self.git.bisect_mark(verdict, rev);
        self.inbox
            .dispatch(&self.gateway, request, stamp, move |result| {
                BisectMessage::Marked { verdict, result }
            });
        Ok(())
    }

    /// End the search. State is cleared at once, whatever git is still
    /// doing; results of marks still in flight are ignored.
    pub fn reset(&mut self) {
        log::info!("bisect reset");
        self.guard.close();
        self.session = BisectSession::default();
        self.gateway.submit(self.git.bisect_reset(), |result| match result {
            Ok(output) if output.success() => {}
            Ok(output) => log::warn!("git bisect reset failed: {}", output.diagnostic()),
            Err(err) => log::warn!("git bisect reset failed: {err}"),
        });
    }

    pub fn poll(&mut self) -> Vec<BisectUpdate> {
        let mut updates = Vec::new();
        while let Some(msg) = self.inbox.try_next() {
            updates.extend(self.apply(msg));
        }
        updates
    }

    pub async fn wait_next(&mut self) -> Option<BisectUpdate> {
        let msg = self.inbox.next().await?;
        self.apply(msg)
    }

    fn apply(&mut self, msg: Stamped<(), BisectMessage>) -> Option<BisectUpdate> {
        let message = self.guard.apply(msg, |message| message)?;
        let (verdict, result) = match message {
            BisectMessage::Started(result) => (None, result),
            BisectMessage::Marked { verdict, result } => (Some(verdict), result),
        };

        let output = match result {
            Ok(output) if output.success() => output,
            Ok(output) => {
                return Some(BisectUpdate::Failed {
                    diagnostic: output.diagnostic(),
                });
            }
            Err(err) => {
                return Some(BisectUpdate::Failed {
                    diagnostic: err.to_string(),
                });
            }
        };

        let progress = parse_progress(&output.combined_output());
        self.session.active = true;
        if progress.first_bad.is_some() {
            self.session.first_bad = progress.first_bad.clone();
            self.session.remaining = Some(0);
            self.session.current = None;
        } else {
            self.session.remaining = progress.remaining.or(self.session.remaining);
            self.session.current = progress.current.clone().or(self.session.current.take());
        }

        if let Some(sha) = &self.session.first_bad {
            log::info!("bisect isolated first bad commit {sha}");
        }

        Some(match verdict {
            None => BisectUpdate::Started(progress),
            Some(verdict) => BisectUpdate::Marked { verdict, progress },
        })
    }

    pub fn session(&self) -> &BisectSession {
        &self.session
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }
}
