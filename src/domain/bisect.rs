use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict for the commit currently under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BisectVerdict {
    Good,
    Bad,
    Skip,
}

impl fmt::Display for BisectVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Bad => write!(f, "bad"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// State of one bisection search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BisectSession {
    pub bad_ref: String,
    pub good_ref: String,
    pub active: bool,
    pub first_bad: Option<String>,
    /// Revisions left to test, from the last progress message.
    pub remaining: Option<u32>,
    /// Commit currently checked out for testing.
    pub current: Option<String>,
}

impl BisectSession {
    pub fn is_finished(&self) -> bool {
        self.first_bad.is_some()
    }
}

/// What one good/bad/skip call reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BisectProgress {
    pub first_bad: Option<String>,
    pub remaining: Option<u32>,
    pub current: Option<String>,
}
