//! In-memory [`ColumnStore`] for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{decode_counter, Cell, ColumnFamily, ColumnStore, StoreError};

#[derive(Debug, Default)]
struct Table {
    families: Vec<ColumnFamily>,
    /// `(row, column)` → timestamp → value.
    cells: BTreeMap<(String, String), BTreeMap<u64, Vec<u8>>>,
}

impl Table {
    fn max_versions(&self, column: &str) -> Option<u32> {
        let family = column.split(':').next().unwrap_or(column);
        self.families
            .iter()
            .find(|f| f.name == family)
            .map(|f| f.max_versions)
    }
}

/// Tables held in a map. Can be told to refuse the next N connections.
#[derive(Debug, Default)]
pub struct MemoryColumnStore {
    tables: RwLock<HashMap<String, Table>>,
    /// Present but left out of [`ColumnStore::tables`].
    unlisted: RwLock<HashSet<String>>,
    failures_left: AtomicU32,
}

impl MemoryColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` calls to [`ColumnStore::tables`] fail with
    /// [`StoreError::Connection`].
    pub fn refuse_connections(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Leave `table` out of listings, as when another writer creates it
    /// after the listing was taken.
    pub async fn unlist(&self, table: &str) {
        self.unlisted.write().await.insert(table.to_owned());
    }

    /// Column families `table` was created with.
    pub async fn families(&self, table: &str) -> Option<Vec<ColumnFamily>> {
        self.tables.read().await.get(table).map(|t| t.families.clone())
    }

    /// Latest value at `row`/`column`.
    pub async fn latest(&self, table: &str, row: &str, column: &str) -> Option<(u64, Vec<u8>)> {
        let tables = self.tables.read().await;
        let versions = tables
            .get(table)?
            .cells
            .get(&(row.to_owned(), column.to_owned()))?;
        versions.iter().next_back().map(|(ts, v)| (*ts, v.clone()))
    }
}

#[async_trait]
impl ColumnStore for MemoryColumnStore {
    async fn tables(&self) -> Result<Vec<String>, StoreError> {
        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StoreError::Connection("connection refused".into()));
        }
        let unlisted = self.unlisted.read().await;
        let mut names: Vec<String> = self
            .tables
            .read()
            .await
            .keys()
            .filter(|name| !unlisted.contains(*name))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn create_table(&self, table: &str, families: &[ColumnFamily]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Err(StoreError::TableExists(table.to_owned()));
        }
        tables.insert(
            table.to_owned(),
            Table {
                families: families.to_vec(),
                cells: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn put(&self, table: &str, cell: &Cell) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))?;
        let max_versions = t
            .max_versions(&cell.column)
            .ok_or_else(|| StoreError::Request(format!("unknown column family in {}", cell.column)))?;
        let versions = t
            .cells
            .entry((cell.row.clone(), cell.column.clone()))
            .or_default();
        versions.insert(cell.timestamp, cell.value.clone());
        while versions.len() > max_versions as usize {
            versions.pop_first();
        }
        Ok(())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Cell>, StoreError> {
        let tables = self.tables.read().await;
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))?;
        Ok(t.cells
            .iter()
            .flat_map(|((row, column), versions)| {
                versions.iter().rev().map(move |(ts, value)| Cell {
                    row: row.clone(),
                    column: column.clone(),
                    timestamp: *ts,
                    value: value.clone(),
                })
            })
            .collect())
    }

    async fn increment(&self, table: &str, row: &str, column: &str, amount: i64) -> Result<i64, StoreError> {
        let current = self
            .latest(table, row, column)
            .await
            .map(|(_, v)| decode_counter(&v))
            .unwrap_or(0);
        let next = current + amount;
        let cell = Cell {
            row: row.to_owned(),
            column: column.to_owned(),
            timestamp: 0,
            value: next.to_be_bytes().to_vec(),
        };
        self.put(table, &cell).await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(ts: u64, value: &str) -> Cell {
        Cell {
            row: "r".into(),
            column: "cf:record".into(),
            timestamp: ts,
            value: value.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn keeps_at_most_max_versions() {
        let store = MemoryColumnStore::new();
        store
            .create_table("t", &[ColumnFamily::new("cf", 2)])
            .await
            .unwrap();
        for (ts, v) in [(1, "a"), (2, "b"), (3, "c")] {
            store.put("t", &cell(ts, v)).await.unwrap();
        }
        let cells = store.scan("t").await.unwrap();
        let timestamps: Vec<u64> = cells.iter().map(|c| c.timestamp).collect();
        assert_eq!(timestamps, vec![3, 2]);
    }

    #[tokio::test]
    async fn put_into_missing_table_fails() {
        let store = MemoryColumnStore::new();
        assert!(matches!(
            store.put("nope", &cell(1, "a")).await,
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unlisted_tables_still_exist() {
        let store = MemoryColumnStore::new();
        store.create_table("t", &[ColumnFamily::new("cf", 1)]).await.unwrap();
        store.unlist("t").await;
        assert!(store.tables().await.unwrap().is_empty());
        assert!(matches!(
            store.create_table("t", &[]).await,
            Err(StoreError::TableExists(_))
        ));
    }

    #[tokio::test]
    async fn refused_connections_run_out() {
        let store = MemoryColumnStore::new();
        store.refuse_connections(2);
        assert!(store.tables().await.is_err());
        assert!(store.tables().await.is_err());
        assert!(store.tables().await.is_ok());
    }
}
