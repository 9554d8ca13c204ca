//! Callbacks feature module
//!
//! Success signals from the n8n workflow. Each accepted call advances the
//! run's completed counter by one.

pub mod acceptance;
pub mod commands;
pub mod routes;

pub use routes::callbacks_routes;
