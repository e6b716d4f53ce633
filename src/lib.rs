//! Workflow definition and execution engine for a declarative task-orchestration DSL.
//!
//! A [`core::model::Workflow`] is a tree of typed tasks. [`core::runner::WorkflowRunner`]
//! walks that tree, threading a [`core::context::WorkflowContext`] through every step, and
//! produces either the final output or a single [`core::error::WorkflowError`].

pub mod cli;
pub mod core;
pub mod logging;

/// Current crate version string exposed for CLI and tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Result<T> = std::result::Result<T, anyhow::Error>;
