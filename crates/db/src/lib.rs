//! Table backends for the bookshelf service.
//!
//! The remote store is a hosted spreadsheet database (Airtable). Everything
//! above this crate talks to it through [`TableBackend`], so tests can swap
//! in [`InMemoryTable`] without touching the network.

use async_trait::async_trait;

pub mod airtable;
pub mod error;
pub mod memory;
pub mod query;
pub mod record;

pub use airtable::{AirtableConfig, AirtableTable};
pub use error::TableError;
pub use memory::InMemoryTable;
pub use query::{Direction, Formula, ListQuery, Sort};
pub use record::{Fields, Record};

/// Operations the service needs from a remote table.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// List records matching the query, following pagination to the end.
    async fn list(&self, query: &ListQuery) -> Result<Vec<Record>, TableError>;

    /// Insert a new record and return it as stored.
    async fn create(&self, fields: Fields) -> Result<Record, TableError>;

    /// Return the first record matching the formula, if any.
    async fn first(&self, formula: &Formula) -> Result<Option<Record>, TableError>;

    /// Apply a partial update to an existing record.
    async fn update(&self, record_id: &str, fields: Fields) -> Result<Record, TableError>;
}
