//! Infrastructure layer (adapters/implementations).
//!
//! Process execution, the git/gh command vocabulary, diff parsing and
//! configuration. Workflows in `application` build on these.

pub mod app_config;
pub mod diff;
pub mod git;
pub mod process;
pub mod repo;
pub mod shell;
pub mod vcs;
