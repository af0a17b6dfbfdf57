//! Rows handed to the storage sinks.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::StoreRow;

/// Store receiving one row per history bucket.
pub const HISTORY_STORE: &str = "cpu_history";
/// Store receiving one summary row per visit.
pub const SUMMARY_STORE: &str = "cpu";

/// One row per bucket. `time` is the bucket index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub url: String,
    pub time: u64,
    pub step: String,
    pub context: String,
    #[serde(flatten)]
    pub counters: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
}

/// One row per visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRecord {
    pub url: String,
    pub context: String,
    /// Index of the last bucket of the run.
    pub time: u64,
    #[serde(flatten)]
    pub counters: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(
        rename = "TaskDurationWithoutDevTools",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub task_duration_without_dev_tools: Option<f64>,
}

impl HistoryRecord {
    pub fn to_row(&self) -> Result<StoreRow> {
        to_row(self).context("failed to serialize history record")
    }
}

impl SummaryRecord {
    pub fn to_row(&self) -> Result<StoreRow> {
        to_row(self).context("failed to serialize summary record")
    }
}

fn to_row<T: Serialize>(record: &T) -> Result<StoreRow> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("record serialized to non-object {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_row_flattens_counters_and_derived_field() {
        let record = SummaryRecord {
            url: "https://example.test/".into(),
            context: "main".into(),
            time: 4,
            counters: BTreeMap::from([("ScriptDuration".to_string(), 0.5)]),
            cpu: None,
            task_duration_without_dev_tools: Some(0.5),
        };

        let row = record.to_row().unwrap();
        assert_eq!(row["url"], "https://example.test/");
        assert_eq!(row["time"], 4);
        assert_eq!(row["ScriptDuration"], 0.5);
        assert_eq!(row["TaskDurationWithoutDevTools"], 0.5);
        assert!(!row.contains_key("cpu"));
    }

    #[test]
    fn history_row_carries_cpu_when_set() {
        let record = HistoryRecord {
            url: "u".into(),
            time: 0,
            step: "s".into(),
            context: "c".into(),
            counters: BTreeMap::new(),
            cpu: Some(1.25),
        };
        let row = record.to_row().unwrap();
        assert_eq!(row["cpu"], 1.25);
        assert_eq!(row["step"], "s");
    }
}
