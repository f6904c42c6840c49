//! Pull request review: reply threads rebuilt from the hosting service and
//! a queue of comments waiting to be submitted.

pub mod queue;
pub mod session;
pub mod threads;

pub use queue::{QueuedComment, ReviewQueue};
pub use session::{ReviewSession, ReviewUpdate, fetch_threads};
pub use threads::{ThreadMap, build_threads};
