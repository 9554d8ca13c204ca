//! Callrun Server Library
//!
//! HTTP service that starts a fetch-and-notify job on demand and tracks how
//! far it got.
//!
//! # Overview
//!
//! - **Trigger** (`POST /api/start-calls`): resets progress and launches the job
//! - **Callbacks** (`POST /api/n8n/callback`): each success signal adds one to the counter
//! - **Status** (`GET /api/counter`): what polling clients read
//! - **Health** (`GET /api/health`)
//!
//! # Architecture
//!
//! - [`store`] owns the persisted [`models::RunState`] and serializes every
//!   read-modify-write behind one lock
//! - [`runner`] spawns the job as a child process and, once it exits, folds
//!   the record count from its artifact into the state
//! - [`features`] holds the vertical slices (commands, queries, routes)
//!
//! # Example
//!
//! ```no_run
//! use callrun_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;
pub mod models;
pub mod runner;
pub mod store;

// Re-export commonly used types
pub use error::{AppError, AppResult};
