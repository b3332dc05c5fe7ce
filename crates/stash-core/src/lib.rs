//! Stash Core
//!
//! Helpers shared by every crate in the stash workspace: hash collection
//! aliases, logging setup and profiling scopes.

pub mod collections;
pub mod logging;
pub mod profiling;
