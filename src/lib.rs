//! gitweave: structured state for git and GitHub workflows.
//!
//! Raw command output (unified diffs, `git log`, bisect progress, review
//! comment JSON) goes in; navigable markers, threads, instruction lists and
//! pipeline steps come out. Every external command runs through
//! [`infra::process::Gateway`].

pub mod application;
pub mod domain;
pub mod infra;
