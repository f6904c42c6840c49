//! Hosting-service adapters.

pub mod github;
