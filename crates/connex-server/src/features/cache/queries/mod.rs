//! Cache queries

pub mod list_entries;

pub use list_entries::{
    ListDatesResponse, ListEntriesError, ListEntriesQuery, ListEntriesResponse,
};
