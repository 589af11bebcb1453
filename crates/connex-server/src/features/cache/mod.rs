//! Cache feature module
//!
//! Read-only view of the date-partitioned cache index.

pub mod queries;
pub mod routes;

pub use routes::cache_routes;
