use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cumulative clock counter every snapshot is ordered and bucketed by.
pub const TIMESTAMP: &str = "Timestamp";
pub const TASK_DURATION: &str = "TaskDuration";
pub const DEV_TOOLS_COMMAND_DURATION: &str = "DevToolsCommandDuration";
/// Derived summary column under the delta policy.
pub const TASK_DURATION_WITHOUT_DEV_TOOLS: &str = "TaskDurationWithoutDevTools";
/// Derived column under the average policy.
pub const CPU: &str = "cpu";

/// Time basis requested when enabling the counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimeDomain {
    TimeTicks,
}

impl TimeDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeDomain::TimeTicks => "timeTicks",
        }
    }
}

impl Default for TimeDomain {
    fn default() -> Self {
        TimeDomain::TimeTicks
    }
}

/// A counter the reduction tracks, with the human label used for store columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterSpec {
    pub name: String,
    pub label: String,
}

impl CounterSpec {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
        }
    }

    pub fn is_duration(&self) -> bool {
        self.name.ends_with("Duration")
    }

    /// Duration counters that count towards `TaskDurationWithoutDevTools`.
    pub fn counts_without_dev_tools(&self) -> bool {
        self.is_duration()
            && self.name != TASK_DURATION
            && self.name != DEV_TOOLS_COMMAND_DURATION
    }
}

pub fn default_counters() -> Vec<CounterSpec> {
    vec![
        CounterSpec::new("LayoutDuration", "Layout Duration"),
        CounterSpec::new("RecalcStyleDuration", "Recalc Style Duration"),
        CounterSpec::new(DEV_TOOLS_COMMAND_DURATION, "Dev Tools Command Duration"),
        CounterSpec::new("ScriptDuration", "Script Duration"),
        CounterSpec::new("V8CompileDuration", "V8 Compile Duration"),
        CounterSpec::new(TASK_DURATION, "Task Duration"),
        CounterSpec::new("TaskOtherDuration", "Task Other Duration"),
    ]
}

/// One `{name, value}` pair as the protocol reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricEntry {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// Raw answer to a counter fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsResponse {
    #[serde(default)]
    pub metrics: Vec<MetricEntry>,
}

impl MetricsResponse {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self {
            metrics: pairs
                .into_iter()
                .map(|(name, value)| MetricEntry {
                    name: name.to_string(),
                    value: Value::from(value),
                })
                .collect(),
        }
    }

    /// Numeric, finite readings keyed by counter name. Later duplicates win.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .filter_map(|entry| {
                entry
                    .value
                    .as_f64()
                    .filter(|value| value.is_finite())
                    .map(|value| (entry.name.clone(), value))
            })
            .collect()
    }
}

/// One captured reading of every cumulative counter, tagged with the labels
/// active when it was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CounterSnapshot {
    pub timestamp: f64,
    pub context: String,
    pub step: String,
    pub values: BTreeMap<String, f64>,
}

impl CounterSnapshot {
    /// Returns `None` when the response carries no usable `Timestamp`.
    pub fn from_response(response: &MetricsResponse, context: &str, step: &str) -> Option<Self> {
        let values = response.values();
        let timestamp = *values.get(TIMESTAMP)?;

        Some(Self {
            timestamp,
            context: context.to_string(),
            step: step.to_string(),
            values,
        })
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_skip_non_numeric_entries() {
        let response: MetricsResponse = serde_json::from_value(json!({
            "metrics": [
                {"name": "Timestamp", "value": 12.5},
                {"name": "ScriptDuration", "value": "n/a"},
                {"name": "LayoutDuration", "value": 0.25},
                {"name": "Nodes"}
            ]
        }))
        .unwrap();

        let values = response.values();
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("LayoutDuration"), Some(&0.25));
        assert!(!values.contains_key("ScriptDuration"));
        assert!(!values.contains_key("Nodes"));
    }

    #[test]
    fn snapshot_requires_timestamp() {
        let response = MetricsResponse::from_pairs([("ScriptDuration", 1.0)]);
        assert!(CounterSnapshot::from_response(&response, "", "").is_none());

        let response = MetricsResponse::from_pairs([(TIMESTAMP, 3.0), ("ScriptDuration", 1.0)]);
        let snapshot = CounterSnapshot::from_response(&response, "main", "login").unwrap();
        assert_eq!(snapshot.timestamp, 3.0);
        assert_eq!(snapshot.context, "main");
        assert_eq!(snapshot.step, "login");
        assert_eq!(snapshot.value("ScriptDuration"), Some(1.0));
    }

    #[test]
    fn task_duration_without_dev_tools_membership() {
        let counters = default_counters();
        let members: Vec<&str> = counters
            .iter()
            .filter(|c| c.counts_without_dev_tools())
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            members,
            vec![
                "LayoutDuration",
                "RecalcStyleDuration",
                "ScriptDuration",
                "V8CompileDuration",
                "TaskOtherDuration"
            ]
        );
    }
}
