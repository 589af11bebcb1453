//! Data commands

pub mod extract;

pub use extract::{ExtractCommand, ExtractCommandError, ExtractResponse};
