//! [`RestColumnStore`]: adapter for the HBase REST gateway.
//!
//! Row keys, column names and cell values travel base64-encoded inside the
//! gateway's JSON `CellSet` documents:
//!
//! ```json
//! {"Row":[{"key":"cm93","Cell":[{"column":"Y2Y6cmVjb3Jk","timestamp":1,"$":"e30="}]}]}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::ACCEPT, Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode_counter, Cell, ColumnFamily, ColumnStore, StoreError};

const JSON: &str = "application/json";
/// Row segment used for writes; the real key travels in the body.
const WRITE_ROW: &str = "false-row-key";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CellSet {
    #[serde(rename = "Row", default)]
    rows: Vec<RowModel>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RowModel {
    key: String,
    #[serde(rename = "Cell", default)]
    cells: Vec<CellModel>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellModel {
    column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
    #[serde(rename = "$")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct TableList {
    #[serde(default)]
    table: Vec<TableName>,
}

#[derive(Debug, Deserialize)]
struct TableName {
    name: String,
}

#[derive(Debug, Serialize)]
struct TableSchema<'a> {
    name: &'a str,
    #[serde(rename = "ColumnSchema")]
    column_schema: Vec<ColumnSchema<'a>>,
}

#[derive(Debug, Serialize)]
struct ColumnSchema<'a> {
    name: &'a str,
    #[serde(rename = "VERSIONS")]
    versions: String,
}

/// HBase REST gateway client.
#[derive(Debug, Clone)]
pub struct RestColumnStore {
    base: Url,
    client: Client,
}

impl RestColumnStore {
    /// Client for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Request`] if the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let base = Url::parse(base_url)
            .map_err(|e| StoreError::Request(format!("invalid gateway URL {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Request(format!("invalid gateway URL {base_url}")));
        }
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self { base, client })
    }

    /// Client for the gateway on `host`. A value that is already a URL is
    /// used as is.
    pub fn for_host(host: &str, port: u16) -> Result<Self, StoreError> {
        if host.contains("://") {
            Self::new(host)
        } else {
            Self::new(&format!("http://{host}:{port}"))
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn cell_set(&self, url: Url) -> Result<Option<CellSet>, StoreError> {
        let resp = self
            .client
            .get(url.clone())
            .header(ACCEPT, JSON)
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = success(resp, "GET", &url).await?;
        let set = resp
            .json()
            .await
            .map_err(|e| StoreError::Request(format!("malformed cell set from {url}: {e}")))?;
        Ok(Some(set))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let url = self.url(&[table, "schema"]);
        let resp = self
            .client
            .get(url.clone())
            .header(ACCEPT, JSON)
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        success(resp, "GET", &url).await?;
        Ok(true)
    }
}

#[async_trait]
impl ColumnStore for RestColumnStore {
    async fn tables(&self) -> Result<Vec<String>, StoreError> {
        let url = self.url(&[]);
        let resp = self
            .client
            .get(url.clone())
            .header(ACCEPT, JSON)
            .send()
            .await
            .map_err(transport)?;
        let list: TableList = success(resp, "GET", &url)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Request(format!("malformed table list: {e}")))?;
        Ok(list.table.into_iter().map(|t| t.name).collect())
    }

    async fn create_table(&self, table: &str, families: &[ColumnFamily]) -> Result<(), StoreError> {
        if self.table_exists(table).await? {
            return Err(StoreError::TableExists(table.to_owned()));
        }
        let url = self.url(&[table, "schema"]);
        let schema = TableSchema {
            name: table,
            column_schema: families
                .iter()
                .map(|f| ColumnSchema {
                    name: &f.name,
                    versions: f.max_versions.to_string(),
                })
                .collect(),
        };
        let resp = self
            .client
            .put(url.clone())
            .header(ACCEPT, JSON)
            .json(&schema)
            .send()
            .await
            .map_err(transport)?;
        success(resp, "PUT", &url).await?;
        Ok(())
    }

    async fn put(&self, table: &str, cell: &Cell) -> Result<(), StoreError> {
        let url = self.url(&[table, WRITE_ROW]);
        let body = CellSet {
            rows: vec![RowModel {
                key: STANDARD.encode(&cell.row),
                cells: vec![CellModel {
                    column: STANDARD.encode(&cell.column),
                    timestamp: Some(cell.timestamp),
                    value: STANDARD.encode(&cell.value),
                }],
            }],
        };
        let resp = self
            .client
            .put(url.clone())
            .header(ACCEPT, JSON)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::TableNotFound(table.to_owned()));
        }
        success(resp, "PUT", &url).await?;
        debug!(table, row = %cell.row, column = %cell.column, "cell written");
        Ok(())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Cell>, StoreError> {
        // The gateway answers 404 for an empty table as well as a missing one.
        let set = match self.cell_set(self.url(&[table, "*"])).await? {
            Some(set) => set,
            None if self.table_exists(table).await? => CellSet::default(),
            None => return Err(StoreError::TableNotFound(table.to_owned())),
        };
        let mut cells = Vec::new();
        for row in set.rows {
            let key = decode_text(&row.key)?;
            for c in row.cells {
                cells.push(Cell {
                    row: key.clone(),
                    column: decode_text(&c.column)?,
                    timestamp: c.timestamp.unwrap_or(0),
                    value: decode(&c.value)?,
                });
            }
        }
        Ok(cells)
    }

    /// Read-modify-write; not atomic against concurrent writers.
    async fn increment(&self, table: &str, row: &str, column: &str, amount: i64) -> Result<i64, StoreError> {
        let current = match self.cell_set(self.url(&[table, row, column])).await? {
            Some(set) => match set.rows.first().and_then(|r| r.cells.first()) {
                Some(c) => decode_counter(&decode(&c.value)?),
                None => 0,
            },
            None => 0,
        };
        let next = current + amount;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let cell = Cell {
            row: row.to_owned(),
            column: column.to_owned(),
            timestamp,
            value: next.to_be_bytes().to_vec(),
        };
        self.put(table, &cell).await?;
        Ok(next)
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Request(e.to_string())
    }
}

async fn success(resp: Response, method: &str, url: &Url) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let reason = format!("{method} {url} returned status {}: {}", status.as_u16(), body.trim());
    if matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    ) {
        Err(StoreError::Connection(reason))
    } else {
        Err(StoreError::Request(reason))
    }
}

fn decode(encoded: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| StoreError::Request(format!("invalid base64 from gateway: {e}")))
}

fn decode_text(encoded: &str) -> Result<String, StoreError> {
    Ok(String::from_utf8_lossy(&decode(encoded)?).into_owned())
}
