//! Application layer (workflow controllers).
//!
//! Each controller owns its state and the results of the commands it
//! issued. Results come back stamped and are applied through a
//! [`StalenessGuard`], so a refresh that lost the race never overwrites a
//! newer one.

pub mod bisect;
pub mod diff_view;
pub(crate) mod inbox;
pub mod rebase;
pub mod review;
pub mod staleness;
pub mod sync;

pub use bisect::{BisectTracker, BisectUpdate, parse_first_bad, parse_remaining};
pub use diff_view::DiffView;
pub use inbox::GatewayResult;
pub use rebase::{RebaseEvent, RebaseSession, RebaseTodo, build_todo, load_todo, parse_commits};
pub use review::{ReviewQueue, ReviewSession, ReviewUpdate, ThreadMap, build_threads};
pub use staleness::{Generation, StalenessGuard, Stamp, Stamped};
pub use sync::{SyncOptions, SyncPipeline, SyncSession};
