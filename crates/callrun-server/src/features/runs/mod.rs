//! Runs feature module
//!
//! Starting a fetch run and polling its progress.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::runs_routes;
