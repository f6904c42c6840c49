use serde::{Deserialize, Serialize};
use std::fmt;

pub type CommentId = u64;

/// One review comment as returned by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: CommentId,
    /// Comment this one replies to, if any.
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub path: String,
    /// Current line in the diff; absent once the comment is outdated.
    #[serde(default)]
    pub line: Option<u32>,
    /// Line the comment was originally written against.
    #[serde(default)]
    pub original_line: Option<u32>,
    pub body: String,
    pub author: String,
}

impl ReviewComment {
    pub fn effective_line(&self) -> Option<u32> {
        self.line.or(self.original_line)
    }
}

/// A root comment and its replies, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewThread {
    pub id: CommentId,
    pub members: Vec<ReviewComment>,
    pub anchor_path: String,
    pub anchor_line: Option<u32>,
}

impl ReviewThread {
    /// True when the thread started from a reply whose parent never arrived.
    pub fn is_orphaned(&self) -> bool {
        self.members
            .first()
            .is_some_and(|root| root.parent_id.is_some())
    }
}

/// Which side of the diff a pending comment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DiffSide {
    #[serde(rename = "LEFT")]
    Left,
    #[default]
    #[serde(rename = "RIGHT")]
    Right,
}

impl fmt::Display for DiffSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
        }
    }
}

/// A locally composed comment waiting for batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingComment {
    pub path: String,
    pub line: u32,
    pub side: DiffSide,
    pub body: String,
}

/// Pull request coordinates on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u32,
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}
