//! Data feature module
//!
//! Triggers extractions and exposes the jobs they create.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::{data_routes, jobs_routes};
