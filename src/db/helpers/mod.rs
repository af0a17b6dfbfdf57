use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::storage::{StoreColumns, StoreRow};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Columns are kept as `[name, label]` pairs so declaration order survives.
pub fn columns_to_json(columns: &StoreColumns) -> Result<String> {
    serde_json::to_string(columns).context("failed to serialize store columns")
}

pub fn columns_from_json(raw: &str) -> Result<StoreColumns> {
    serde_json::from_str(raw).context("failed to parse store columns")
}

pub fn row_from_json(raw: &str) -> Result<StoreRow> {
    serde_json::from_str(raw).context("failed to parse stored row")
}

/// The `url` column of a row, if it is a string.
pub fn row_url(row: &StoreRow) -> Option<String> {
    row.get("url").and_then(Value::as_str).map(str::to_string)
}
