//! `sandcore` orchestrates the lifecycle of ephemeral sandboxes.
//!
//! # Overview
//!
//! Clients create, inspect, extend and delete sandboxes through a REST API. Creating and
//! destroying the resource behind a sandbox is slow, so every lifecycle request answers
//! immediately with a consistent snapshot and the slow part continues in a background task:
//!
//! ```text
//! pending -> running | failed
//! running -> deleted | stopped | expired
//! stopped -> deleted
//! failed  -> deleted
//! ```
//!
//! # Architecture
//!
//! - **Lifecycle**: the [`Orchestrator`](lifecycle::Orchestrator) owns the state machine,
//!   serializes all mutations of one sandbox and spawns the background tasks
//! - **Store**: keyed storage of sandbox records, in memory or in SQLite
//! - **Provision**: the boundary to the backend that creates and destroys resources
//! - **Server**: the REST API
//!
//! Background tasks are tracked by a [`ShutdownCoordinator`](sandutils::ShutdownCoordinator), so
//! the service finishes every accepted creation and removal before it exits.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use sandcore::{config::SandcoreConfig, lifecycle::Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SandcoreConfig::load(None).await?;
//!     let orchestrator = Orchestrator::from_config(&config).await?;
//!
//!     let sandbox = orchestrator.create("demo", None).await?;
//!     println!("created {} ({})", sandbox.id, sandbox.status);
//!
//!     orchestrator.drain().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod error;

pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod models;
pub mod provision;
pub mod server;
pub mod store;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use error::*;
