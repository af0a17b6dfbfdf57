//! Tabular sinks that receive the finished records.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// One row, column name to value.
pub type StoreRow = Map<String, Value>;

/// Column name and human label, in declaration order.
pub type StoreColumns = Vec<(String, String)>;

/// Receiver of analysis output. A store is installed once, before any row is
/// appended to it; rows are append-only.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn install_store(&self, store: &str, columns: &StoreColumns) -> Result<()>;

    async fn add(&self, store: &str, row: StoreRow) -> Result<()>;
}

#[derive(Default)]
struct MemoryStores {
    columns: BTreeMap<String, StoreColumns>,
    rows: BTreeMap<String, Vec<StoreRow>>,
}

/// Keeps everything in memory; handy for tests and for hosts that post-process.
#[derive(Default)]
pub struct MemorySink {
    inner: Mutex<MemoryStores>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn columns(&self, store: &str) -> Option<StoreColumns> {
        self.inner.lock().await.columns.get(store).cloned()
    }

    pub async fn rows(&self, store: &str) -> Vec<StoreRow> {
        self.inner
            .lock()
            .await
            .rows
            .get(store)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn row_count(&self) -> usize {
        self.inner.lock().await.rows.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn install_store(&self, store: &str, columns: &StoreColumns) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.columns.insert(store.to_string(), columns.clone());
        guard.rows.entry(store.to_string()).or_default();
        Ok(())
    }

    async fn add(&self, store: &str, row: StoreRow) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if !guard.columns.contains_key(store) {
            bail!("store '{store}' was not installed");
        }
        guard.rows.entry(store.to_string()).or_default().push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_sink_requires_install() {
        let sink = MemorySink::new();
        let row = json!({"url": "u"}).as_object().cloned().unwrap();

        assert!(sink.add("cpu", row.clone()).await.is_err());

        let columns = vec![("url".to_string(), "Url".to_string())];
        sink.install_store("cpu", &columns).await.unwrap();
        sink.add("cpu", row).await.unwrap();

        assert_eq!(sink.columns("cpu").await, Some(columns));
        assert_eq!(sink.rows("cpu").await.len(), 1);
        assert_eq!(sink.row_count().await, 1);
    }
}
