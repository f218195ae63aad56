//! Loading a record file into the column store.
//!
//! A run connects, obtains a data key, then writes every record in file order.
//! Only connecting is retried, after a fixed delay. Once records are being
//! written any failure ends the run, so counters are never bumped twice.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use common::{KeyService, KeyServiceError};
use thiserror::Error;
use tracing::{info, warn};

use crate::cli::Config;
use crate::housekeeping;
use crate::records::{self, Outcome, RecordError, RECORD_COLUMN};
use crate::store::{decode_counter, Cell, ColumnFamily, ColumnStore, StoreError};

/// Family holding the record column.
pub const RECORD_FAMILY: &str = "cf";
/// Versions kept per record cell.
pub const RECORD_MAX_VERSIONS: u32 = 1_000_000;
/// Family of the per-topic counter.
pub const COUNTER_FAMILY: &str = "c";
/// Per-topic message counter.
pub const COUNTER_COLUMN: &str = "c:msg";

/// Errors ending a run.
#[derive(Debug, Error)]
pub enum PopulateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    KeyService(#[from] KeyServiceError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("{0:#}")]
    Io(#[from] anyhow::Error),

    #[error("gave up connecting to the column store after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// What a run does, independent of where it writes.
#[derive(Debug, Clone)]
pub struct Options {
    pub records: PathBuf,
    pub data_table: Option<String>,
    pub topics_table: Option<String>,
    pub create_tables: bool,
    pub dump_contents: bool,
    pub completed_flag: Option<PathBuf>,
}

impl From<&Config> for Options {
    fn from(cfg: &Config) -> Self {
        Self {
            records: cfg.test_configuration_file.clone(),
            data_table: cfg.data_table.clone(),
            topics_table: cfg.topics_table.clone(),
            create_tables: !cfg.skip_table_creation,
            dump_contents: cfg.dump_contents,
            completed_flag: cfg.completed_flag.clone(),
        }
    }
}

/// Fixed-delay retry schedule for unreachable stores.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&Config> for RetrySettings {
    fn from(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            delay: cfg.retry_delay(),
        }
    }
}

/// Counts for one successful run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub stored: usize,
    pub skipped: usize,
    pub tables_created: usize,
}

/// Populate the store, retrying the connection while it is unreachable.
///
/// # Errors
///
/// [`PopulateError::Exhausted`] once `retry.max_attempts` connection attempts
/// have failed; otherwise the first failure after connecting.
pub async fn run(
    store: &dyn ColumnStore,
    keys: &dyn KeyService,
    opts: &Options,
    retry: &RetrySettings,
) -> Result<Summary, PopulateError> {
    let known = connect(store, retry).await?;
    populate(store, keys, opts, known).await
}

/// List the store's tables, which is the first call that needs the store.
async fn connect(store: &dyn ColumnStore, retry: &RetrySettings) -> Result<HashSet<String>, PopulateError> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match store.tables().await {
            Ok(tables) => {
                let known: HashSet<String> = tables.into_iter().collect();
                info!(tables = ?known, "connected to column store");
                return Ok(known);
            }
            Err(StoreError::Connection(reason)) => {
                attempt += 1;
                warn!(attempt, max_attempts, %reason, "failed to connect to column store");
                if attempt >= max_attempts {
                    return Err(PopulateError::Exhausted { attempts: attempt });
                }
                tokio::time::sleep(retry.delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn populate(
    store: &dyn ColumnStore,
    keys: &dyn KeyService,
    opts: &Options,
    mut known: HashSet<String>,
) -> Result<Summary, PopulateError> {
    let key = keys.issue().await?;
    let records = records::load(&opts.records).await?;
    info!(records = records.len(), path = %opts.records.display(), "loaded test records");

    let mut summary = Summary::default();
    if let Some(topics) = &opts.topics_table {
        if ensure_table(store, &mut known, topics, ColumnFamily::new(COUNTER_FAMILY, 1), opts.create_tables).await? {
            summary.tables_created += 1;
        }
    }

    let mut touched = BTreeSet::new();
    for record in records {
        let outcome = records::prepare(record, &key, opts.data_table.as_deref())?;
        let family = ColumnFamily::new(RECORD_FAMILY, RECORD_MAX_VERSIONS);
        if ensure_table(store, &mut known, outcome.table(), family, opts.create_tables).await? {
            summary.tables_created += 1;
        }

        let prepared = match outcome {
            Outcome::Store(prepared) => prepared,
            Outcome::Skip { row, table } => {
                info!(row = %row, table = %table, "skipped record as dbObject was missing");
                summary.skipped += 1;
                continue;
            }
        };

        let cell = Cell {
            row: prepared.row,
            column: RECORD_COLUMN.to_owned(),
            timestamp: prepared.timestamp,
            value: prepared.value,
        };
        store.put(&prepared.table, &cell).await?;
        info!(
            row = %cell.row,
            timestamp = cell.timestamp,
            topic = %prepared.topic,
            table = %prepared.table,
            "saved record"
        );

        if let Some(topics) = &opts.topics_table {
            store.increment(topics, &prepared.topic, COUNTER_COLUMN, 1).await?;
        }
        touched.insert(prepared.table);
        summary.stored += 1;
    }

    if opts.dump_contents {
        touched.extend(opts.topics_table.iter().cloned());
        for table in &touched {
            dump(store, table).await?;
        }
    }

    if let Some(flag) = &opts.completed_flag {
        housekeeping::create_completion_flag(flag).await?;
    }

    Ok(summary)
}

/// Create `table` unless it is known or creation is disabled. Returns
/// whether a table was created.
async fn ensure_table(
    store: &dyn ColumnStore,
    known: &mut HashSet<String>,
    table: &str,
    family: ColumnFamily,
    create: bool,
) -> Result<bool, StoreError> {
    if !create || known.contains(table) {
        return Ok(false);
    }
    let created = match store.create_table(table, &[family]).await {
        Ok(()) => {
            info!(table, "created table");
            true
        }
        Err(StoreError::TableExists(_)) => {
            info!(table, "table already exists");
            false
        }
        Err(e) => return Err(e),
    };
    known.insert(table.to_owned());
    Ok(created)
}

async fn dump(store: &dyn ColumnStore, table: &str) -> Result<(), StoreError> {
    let cells = store.scan(table).await?;
    info!(table, cells = cells.len(), "table contents");
    for cell in cells {
        let value = if cell.column == COUNTER_COLUMN {
            decode_counter(&cell.value).to_string()
        } else {
            String::from_utf8_lossy(&cell.value).into_owned()
        };
        info!(
            table,
            row = %cell.row,
            column = %cell.column,
            timestamp = cell.timestamp,
            value = %value,
            "cell"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryColumnStore;
    use async_trait::async_trait;
    use common::dks::StaticKeyService;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Drops the connection on the `drop_on`th put.
    struct DroppingStore {
        inner: MemoryColumnStore,
        puts: AtomicU32,
        drop_on: u32,
    }

    #[async_trait]
    impl ColumnStore for DroppingStore {
        async fn tables(&self) -> Result<Vec<String>, StoreError> {
            self.inner.tables().await
        }

        async fn create_table(&self, table: &str, families: &[ColumnFamily]) -> Result<(), StoreError> {
            self.inner.create_table(table, families).await
        }

        async fn put(&self, table: &str, cell: &Cell) -> Result<(), StoreError> {
            if self.puts.fetch_add(1, Ordering::SeqCst) + 1 == self.drop_on {
                return Err(StoreError::Connection("connection reset".into()));
            }
            self.inner.put(table, cell).await
        }

        async fn scan(&self, table: &str) -> Result<Vec<Cell>, StoreError> {
            self.inner.scan(table).await
        }

        async fn increment(&self, table: &str, row: &str, column: &str, amount: i64) -> Result<i64, StoreError> {
            self.inner.increment(table, row, column, amount).await
        }
    }

    fn write_records(dir: &std::path::Path) -> PathBuf {
        let records = json!([
            {
                "kafka_message_id": "id-1",
                "kafka_message_timestamp": 1000,
                "kafka_message_value": {"message": {
                    "db": "core", "collection": "claimant-advance",
                    "dbObject": "x", "encryption": {}
                }}
            },
            {
                "kafka_message_id": "id-2",
                "kafka_message_timestamp": "2000",
                "kafka_message_value": {"message": {
                    "db": "core", "collection": "claimant-advance",
                    "dbObject": "CORRUPT", "encryption": {}
                }}
            },
            {
                "kafka_message_id": "id-3",
                "kafka_message_timestamp": 3000,
                "kafka_message_value": {"message": {
                    "db": "core", "collection": "contract"
                }}
            },
            {
                "kafka_message_id": "id-4",
                "kafka_message_timestamp": 4000,
                "kafka_message_value": {"message": {
                    "db": "core", "collection": "contract",
                    "dbObject": "y", "encryption": {}
                }}
            }
        ]);
        let path = dir.join("records.json");
        std::fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();
        path
    }

    fn options(dir: &std::path::Path) -> Options {
        Options {
            records: write_records(dir),
            data_table: None,
            topics_table: None,
            create_tables: true,
            dump_contents: false,
            completed_flag: Some(dir.join("flag")),
        }
    }

    async fn counter(store: &MemoryColumnStore, topic: &str) -> i64 {
        let (_, v) = store.latest("topics", topic, COUNTER_COLUMN).await.unwrap();
        decode_counter(&v)
    }

    fn no_delay(max_attempts: u32) -> RetrySettings {
        RetrySettings {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn stores_records_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        let opts = options(dir.path());

        let summary = run(&store, &StaticKeyService::default(), &opts, &no_delay(1))
            .await
            .unwrap();
        assert_eq!(
            summary,
            Summary {
                stored: 3,
                skipped: 1,
                tables_created: 2,
            }
        );

        assert_eq!(
            store.families("core:claimant_advance").await.unwrap(),
            vec![ColumnFamily::new("cf", 1_000_000)]
        );
        let (ts, value) = store
            .latest("core:claimant_advance", "id-2", "cf:record")
            .await
            .unwrap();
        assert_eq!(ts, 2000);
        let value: Value = serde_json::from_slice(&value).unwrap();
        assert_eq!(value["message"]["encryption"]["initialisationVector"], "PHONEYVECTOR");

        assert!(store.latest("core:contract", "id-3", "cf:record").await.is_none());
        assert!(store.latest("core:contract", "id-4", "cf:record").await.is_some());
        assert!(dir.path().join("flag").is_dir());
    }

    #[tokio::test]
    async fn counts_messages_per_topic() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        let mut opts = options(dir.path());
        opts.topics_table = Some("topics".into());
        opts.data_table = Some("data".into());
        opts.dump_contents = true;

        let summary = run(&store, &StaticKeyService::default(), &opts, &no_delay(1))
            .await
            .unwrap();
        assert_eq!(summary.tables_created, 2);

        assert_eq!(counter(&store, "db.core.claimant-advance").await, 2);
        assert_eq!(counter(&store, "db.core.contract").await, 1);
        assert_eq!(store.scan("data").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn existing_tables_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        store
            .create_table("core:contract", &[ColumnFamily::new("cf", 5)])
            .await
            .unwrap();

        let summary = run(&store, &StaticKeyService::default(), &options(dir.path()), &no_delay(1))
            .await
            .unwrap();
        assert_eq!(summary.tables_created, 1);
        assert_eq!(
            store.families("core:contract").await.unwrap(),
            vec![ColumnFamily::new("cf", 5)]
        );
    }

    #[tokio::test]
    async fn skipped_creation_fails_on_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        let mut opts = options(dir.path());
        opts.create_tables = false;

        let err = run(&store, &StaticKeyService::default(), &opts, &no_delay(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PopulateError::Store(StoreError::TableNotFound(_))));
        assert!(!dir.path().join("flag").exists());
    }

    #[tokio::test]
    async fn retries_until_the_store_answers() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        store.refuse_connections(2);

        let summary = run(&store, &StaticKeyService::default(), &options(dir.path()), &no_delay(3))
            .await
            .unwrap();
        assert_eq!(summary.stored, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        store.refuse_connections(10);

        let err = run(&store, &StaticKeyService::default(), &options(dir.path()), &no_delay(3))
            .await
            .unwrap_err();
        assert!(matches!(err, PopulateError::Exhausted { attempts: 3 }));
        assert!(!dir.path().join("flag").exists());
    }

    #[tokio::test]
    async fn skipped_record_still_creates_its_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        let records = json!([{
            "kafka_message_id": "id-3",
            "kafka_message_timestamp": 3000,
            "kafka_message_value": {"message": {"db": "core", "collection": "contract"}}
        }]);
        let mut opts = options(dir.path());
        opts.records = dir.path().join("skipped.json");
        std::fs::write(&opts.records, serde_json::to_vec(&records).unwrap()).unwrap();

        let summary = run(&store, &StaticKeyService::default(), &opts, &no_delay(1))
            .await
            .unwrap();
        assert_eq!(
            summary,
            Summary {
                stored: 0,
                skipped: 1,
                tables_created: 1,
            }
        );
        assert_eq!(
            store.families("core:contract").await.unwrap(),
            vec![ColumnFamily::new("cf", 1_000_000)]
        );
        assert!(store.scan("core:contract").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_connection_after_connecting_is_not_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let store = DroppingStore {
            inner: MemoryColumnStore::new(),
            puts: AtomicU32::new(0),
            drop_on: 2,
        };
        let mut opts = options(dir.path());
        opts.topics_table = Some("topics".into());

        let err = run(&store, &StaticKeyService::default(), &opts, &no_delay(3))
            .await
            .unwrap_err();
        assert!(matches!(err, PopulateError::Store(StoreError::Connection(_))));

        assert_eq!(counter(&store.inner, "db.core.claimant-advance").await, 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 2);
        assert!(!dir.path().join("flag").exists());
    }

    #[tokio::test]
    async fn table_created_by_another_writer_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        store
            .create_table("core:contract", &[ColumnFamily::new("cf", 5)])
            .await
            .unwrap();
        store.unlist("core:contract").await;

        let summary = run(&store, &StaticKeyService::default(), &options(dir.path()), &no_delay(1))
            .await
            .unwrap();
        assert_eq!(summary.tables_created, 1);
        assert_eq!(summary.stored, 3);
        assert_eq!(
            store.families("core:contract").await.unwrap(),
            vec![ColumnFamily::new("cf", 5)]
        );
        assert!(store.latest("core:contract", "id-4", "cf:record").await.is_some());
    }

    #[tokio::test]
    async fn unreadable_records_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryColumnStore::new();
        let mut opts = options(dir.path());
        opts.records = dir.path().join("missing.json");

        let err = run(&store, &StaticKeyService::default(), &opts, &no_delay(3))
            .await
            .unwrap_err();
        assert!(matches!(err, PopulateError::Io(_)));
    }
}
