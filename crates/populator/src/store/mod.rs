//! Column-family store the test records are loaded into.
//!
//! Cells are addressed by table, row key, `family:qualifier` column and
//! timestamp. Tables keep up to `max_versions` timestamped values per cell.

#[cfg(test)]
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use thiserror::Error;

pub use rest::RestColumnStore;

/// Errors talking to the column store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached. Worth retrying.
    #[error("column store unreachable: {0}")]
    Connection(String),

    /// `create_table` named a table that is already there.
    #[error("table {0} already exists")]
    TableExists(String),

    /// The table does not exist.
    #[error("table {0} not found")]
    TableNotFound(String),

    /// The store answered but refused the request.
    #[error("column store request failed: {0}")]
    Request(String),
}

/// A column family definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFamily {
    pub name: String,
    pub max_versions: u32,
}

impl ColumnFamily {
    pub fn new(name: impl Into<String>, max_versions: u32) -> Self {
        Self {
            name: name.into(),
            max_versions,
        }
    }
}

/// One timestamped cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: String,
    /// `family:qualifier`.
    pub column: String,
    pub timestamp: u64,
    pub value: Vec<u8>,
}

/// Sparse, versioned row/column store.
#[async_trait]
pub trait ColumnStore: Send + Sync {
    /// Names of every table.
    async fn tables(&self) -> Result<Vec<String>, StoreError>;

    /// Create `table` with the given column families.
    async fn create_table(&self, table: &str, families: &[ColumnFamily]) -> Result<(), StoreError>;

    /// Write one cell.
    async fn put(&self, table: &str, cell: &Cell) -> Result<(), StoreError>;

    /// Every cell version in `table`, ordered by row then column. A missing
    /// table is [`StoreError::TableNotFound`]; an empty one yields no cells.
    async fn scan(&self, table: &str) -> Result<Vec<Cell>, StoreError>;

    /// Add `amount` to the 64-bit big-endian counter at `row`/`column`,
    /// returning the new value. A missing counter starts at zero.
    async fn increment(&self, table: &str, row: &str, column: &str, amount: i64) -> Result<i64, StoreError>;
}

/// Decode a stored counter. Anything but eight bytes reads as zero.
pub fn decode_counter(value: &[u8]) -> i64 {
    <[u8; 8]>::try_from(value).map(i64::from_be_bytes).unwrap_or(0)
}
