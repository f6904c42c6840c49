use super::error::RebaseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SHORT_SHA_LEN: usize = 7;

/// What an interactive rebase does with one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RebaseAction {
    #[default]
    Pick,
    Reword,
    Edit,
    Squash,
    Fixup,
    Drop,
}

impl RebaseAction {
    pub const ALL: [RebaseAction; 6] = [
        Self::Pick,
        Self::Reword,
        Self::Edit,
        Self::Squash,
        Self::Fixup,
        Self::Drop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Reword => "reword",
            Self::Edit => "edit",
            Self::Squash => "squash",
            Self::Fixup => "fixup",
            Self::Drop => "drop",
        }
    }

    /// Squash and fixup fold into the previous commit.
    pub fn folds_into_previous(&self) -> bool {
        matches!(self, Self::Squash | Self::Fixup)
    }
}

impl fmt::Display for RebaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebaseAction {
    type Err = RebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pick" | "p" => Ok(Self::Pick),
            "reword" | "r" => Ok(Self::Reword),
            "edit" | "e" => Ok(Self::Edit),
            "squash" | "s" => Ok(Self::Squash),
            "fixup" | "f" => Ok(Self::Fixup),
            "drop" | "d" => Ok(Self::Drop),
            other => Err(RebaseError::UnknownAction(other.to_string())),
        }
    }
}

/// One commit in the rebase instruction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseEntry {
    pub sha: String,
    pub short_sha: String,
    pub subject: String,
    pub action: RebaseAction,
}

impl RebaseEntry {
    pub fn new(sha: impl Into<String>, subject: impl Into<String>) -> Self {
        let sha = sha.into();
        let short_sha = sha.chars().take(SHORT_SHA_LEN).collect();
        Self {
            sha,
            short_sha,
            subject: subject.into(),
            action: RebaseAction::Pick,
        }
    }

    /// The instruction line for this entry, always with the full sha.
    pub fn todo_line(&self) -> String {
        if self.subject.is_empty() {
            format!("{} {}", self.action, self.sha)
        } else {
            format!("{} {} {}", self.action, self.sha, self.subject)
        }
    }
}
