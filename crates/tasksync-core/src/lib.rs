//! tasksync-core: optimistic client-side cache and sync engine for a
//! task-tracking API.
//!
//! The engine is sans-IO at its core. [`cache::QueryCache`],
//! [`mutation::MutationExecutor`], [`board::Board`] and
//! [`filters::FilterController`] are plain state machines driven with
//! explicit timestamps and transport results. [`client::TaskClient`] wires
//! them to a [`transport::Transport`] on tokio.
//!
//! # Conventions
//!
//! - **Errors**: library failures are [`error::ApiError`]; file and config
//!   loading uses `anyhow::Result` with context.
//! - **Logging**: `tracing` macros (`debug!` for cache transitions, `info!`
//!   for mutation outcomes, `warn!` for rollbacks and decode problems).

pub mod board;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod filters;
pub mod model;
pub mod mutation;
pub mod prefs;
pub mod query;
pub mod transport;
pub mod wire;

pub use board::{BoardGrouping, project};
pub use cache::{QueryCache, QueryState};
pub use client::{QueryHandle, TaskClient};
pub use error::{ApiError, ErrorCode};
pub use model::{QueryData, Status, Task, TaskChanges, TaskDraft, TaskId};
pub use mutation::{MutationExecutor, MutationKind, MutationOutcome};
pub use query::{FilterChange, QueryKey, TaskFilter};
