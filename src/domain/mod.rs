//! Domain types for gitweave.
//! Plain data handed to the presentation layer; nothing in here spawns a process.

pub mod bisect;
pub mod diff;
pub mod error;
pub mod rebase;
pub mod review;
pub mod sync;

pub use bisect::*;
pub use diff::*;
pub use error::*;
pub use rebase::*;
pub use review::*;
pub use sync::*;
