//! Domain error types for gitweave.
//!
//! A non-zero exit from git or gh is not a gateway error: it is returned as
//! data and only becomes an [`ExecutionFailure`] once a workflow decides the
//! exit code matters. Everything user-visible carries the verbatim diagnostic
//! text the tool printed.

use thiserror::Error;

/// The process could not be started at all.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not find '{0}' executable")]
    MissingBinary(String),

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write stdin for `{program}`: {source}")]
    Stdin {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// An external command exited non-zero.
///
/// `diagnostic` is exactly what the tool printed, never a re-synthesized
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{diagnostic}")]
pub struct ExecutionFailure {
    pub exit_code: i32,
    pub diagnostic: String,
}

/// Errors related to the interactive rebase model and session.
#[derive(Debug, Error)]
pub enum RebaseError {
    #[error("Unknown rebase action: {0}")]
    UnknownAction(String),

    #[error("Rebase entry {index} out of range (list has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Cannot {0} the first commit: there is nothing to fold it into")]
    NothingToFoldInto(super::rebase::RebaseAction),

    #[error("Nothing to rebase onto {base}")]
    NoCommits { base: String },

    #[error("Rebase session is no longer active")]
    SessionClosed,

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors related to bisection.
#[derive(Debug, Error)]
pub enum BisectError {
    #[error("No bisect session is active")]
    NotActive,

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors related to review comment retrieval and submission.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Invalid PR reference: {0}")]
    InvalidPrRef(String),

    #[error("No pull request is open")]
    NoPullRequest,

    #[error("No pending comments to submit")]
    EmptyBatch,

    #[error("Failed to decode review comments: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors that stop the sync pipeline before it can run a step.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync pipeline already finished")]
    Finished,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Unified error type for callers driving several workflows at once.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Rebase error: {0}")]
    Rebase(#[from] RebaseError),

    #[error("Bisect error: {0}")]
    Bisect(#[from] BisectError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
