use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStepKind {
    Fetch,
    Pull,
    AheadCheck,
    Push,
}

impl SyncStepKind {
    pub const ORDER: [SyncStepKind; 4] = [Self::Fetch, Self::Pull, Self::AheadCheck, Self::Push];

    pub fn next(&self) -> Option<SyncStepKind> {
        match self {
            Self::Fetch => Some(Self::Pull),
            Self::Pull => Some(Self::AheadCheck),
            Self::AheadCheck => Some(Self::Push),
            Self::Push => None,
        }
    }
}

impl fmt::Display for SyncStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Pull => write!(f, "pull"),
            Self::AheadCheck => write!(f, "ahead_check"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Result of a single pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    /// The step failed; `diagnostic` is the tool's own text.
    Failed { diagnostic: String },
    /// Pull stopped on conflicts and needs resolution.
    Conflict { diagnostic: String },
    /// Ahead check result. `resolved` is false when there is no upstream to
    /// compare against.
    Ahead { resolved: bool, count: u32 },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStep {
    pub kind: SyncStepKind,
    pub outcome: StepOutcome,
}

/// Overall result once the pipeline stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing to push after pulling.
    UpToDate,
    Pushed { commits: u32 },
    /// Pull hit conflicts; hand off to conflict resolution.
    Conflict { diagnostic: String },
    Failed { step: SyncStepKind, diagnostic: String },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::UpToDate | Self::Pushed { .. })
    }
}
