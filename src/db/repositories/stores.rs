use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::{
    helpers::{columns_from_json, columns_to_json, parse_datetime, row_from_json, row_url},
    Database,
};
use crate::storage::{RecordSink, StoreColumns, StoreRow};

/// A row read back from a store, in append order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: i64,
    pub url: Option<String>,
    pub row: StoreRow,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Declare a store and its column labels. Re-installing replaces the labels.
    pub async fn install_store_columns(&self, store: &str, columns: &StoreColumns) -> Result<()> {
        let store = store.to_string();
        let columns_json = columns_to_json(columns)?;
        let installed_at = Utc::now();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO stores (name, columns_json, installed_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                     columns_json = excluded.columns_json,
                     installed_at = excluded.installed_at",
                params![store, columns_json, installed_at.to_rfc3339()],
            )
            .with_context(|| format!("failed to install store {store}"))?;
            Ok(())
        })
        .await
    }

    pub async fn get_store_columns(&self, store: &str) -> Result<Option<StoreColumns>> {
        let store = store.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT columns_json FROM stores WHERE name = ?1")?;
            let mut rows = stmt.query(params![store])?;
            match rows.next()? {
                Some(row) => Ok(Some(columns_from_json(&row.get::<_, String>(0)?)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn insert_store_row(&self, store: &str, row: StoreRow) -> Result<()> {
        let store = store.to_string();
        let url = row_url(&row);
        let payload = serde_json::to_string(&row).context("failed to serialize store row")?;
        let created_at = Utc::now();
        self.execute(move |conn| {
            let installed: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)",
                    params![store],
                    |row| row.get(0),
                )
                .context("failed to look up store")?;
            if !installed {
                anyhow::bail!("store '{store}' was not installed");
            }

            conn.execute(
                "INSERT INTO store_rows (store, url, payload_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![store, url, payload, created_at.to_rfc3339()],
            )
            .with_context(|| format!("failed to insert row into {store}"))?;
            Ok(())
        })
        .await
    }

    pub async fn get_store_rows(&self, store: &str) -> Result<Vec<StoredRow>> {
        let store = store.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, url, payload_json, created_at
                 FROM store_rows
                 WHERE store = ?1
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![store])?;
            let mut stored = Vec::new();
            while let Some(row) = rows.next()? {
                stored.push(StoredRow {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    row: row_from_json(&row.get::<_, String>(2)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?, "created_at")?,
                });
            }

            Ok(stored)
        })
        .await
    }
}

#[async_trait]
impl RecordSink for Database {
    async fn install_store(&self, store: &str, columns: &StoreColumns) -> Result<()> {
        self.install_store_columns(store, columns).await
    }

    async fn add(&self, store: &str, row: StoreRow) -> Result<()> {
        self.insert_store_row(store, row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> StoreRow {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn rows_round_trip_in_append_order() {
        let db = Database::in_memory().unwrap();
        let columns = vec![
            ("url".to_string(), "Url".to_string()),
            ("time".to_string(), "Time".to_string()),
            ("ScriptDuration".to_string(), "Script Duration".to_string()),
        ];
        db.install_store("cpu_history", &columns).await.unwrap();

        db.add("cpu_history", row(json!({"url": "https://a.test/", "time": 0, "ScriptDuration": 0.5})))
            .await
            .unwrap();
        db.add("cpu_history", row(json!({"url": "https://a.test/", "time": 1, "ScriptDuration": 0.25})))
            .await
            .unwrap();

        assert_eq!(db.get_store_columns("cpu_history").await.unwrap(), Some(columns));

        let stored = db.get_store_rows("cpu_history").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].url.as_deref(), Some("https://a.test/"));
        assert_eq!(stored[0].row["time"], 0);
        assert_eq!(stored[1].row["ScriptDuration"], 0.25);
        assert!(stored[0].id < stored[1].id);
    }

    #[tokio::test]
    async fn add_to_unknown_store_fails() {
        let db = Database::in_memory().unwrap();
        let err = db.add("cpu", row(json!({"url": "u"}))).await.unwrap_err();
        assert!(err.to_string().contains("not installed"));
        assert!(db.get_store_rows("cpu").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reinstall_replaces_labels() {
        let db = Database::in_memory().unwrap();
        db.install_store("cpu", &vec![("url".into(), "Url".into())]).await.unwrap();
        db.install_store("cpu", &vec![("url".into(), "Page".into())]).await.unwrap();

        let columns = db.get_store_columns("cpu").await.unwrap().unwrap();
        assert_eq!(columns, vec![("url".to_string(), "Page".to_string())]);
    }
}
