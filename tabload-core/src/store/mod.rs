//! Store handle abstraction.
//!
//! The pipeline needs exactly two capabilities from the remote store: run a
//! SQL statement, and insert a list of records into a named table. Tests
//! substitute in-memory implementations; [`rest::RestStore`] talks to a
//! PostgREST endpoint.

pub mod rest;

use crate::error::StoreError;

/// One row keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// An authenticated handle to the remote store.
pub trait Store {
    /// Execute a single SQL statement (used only for table creation).
    fn execute_sql(&self, query: &str) -> Result<(), StoreError>;

    /// Insert `records` into `table` in one call.
    fn insert(&self, table: &str, records: &[Record]) -> Result<(), StoreError>;
}
