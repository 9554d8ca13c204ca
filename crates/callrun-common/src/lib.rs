//! Callrun Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces of the callrun workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CallrunError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup shared by the server and the job
//! - **Artifact**: the record list the fetch job leaves behind for the server to count
//! - **Files**: crash-safe whole-file replacement
//!
//! # Example
//!
//! ```no_run
//! use callrun_common::artifact;
//!
//! # async fn run() -> callrun_common::Result<()> {
//! let count = artifact::read_record_count("./data/records.json").await?;
//! println!("job produced {} records", count);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod error;
pub mod fs;
pub mod logging;

// Re-export commonly used types
pub use error::{CallrunError, Result};
