pub mod aggregate;
pub mod attribution;
pub mod bucket;
pub mod config;

pub use bucket::{bucketize, sort_snapshots, Bucket};
pub use config::{ReductionConfig, ReductionPolicy};

use log::warn;
use serde::Serialize;

use crate::counters::CounterSnapshot;
use crate::models::{HistoryRecord, SummaryRecord};

/// Everything one analysis produces for a visit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunReport {
    pub history: Vec<HistoryRecord>,
    pub summary: SummaryRecord,
    pub snapshot_count: usize,
}

/// Reduce a frozen snapshot log into history rows and a summary row.
///
/// Pure and deterministic: the same log, contexts and config always produce
/// the same report. Returns `None` for an empty log or a config that cannot
/// bucket it.
pub fn reduce_run(
    url: &str,
    snapshots: &[CounterSnapshot],
    contexts_seen: &[String],
    config: &ReductionConfig,
) -> Option<RunReport> {
    if snapshots.is_empty() {
        return None;
    }
    if let Err(err) = config.validate() {
        warn!("refusing to reduce {url}: {err}");
        return None;
    }

    let sorted = sort_snapshots(snapshots);
    let mut buckets = bucketize(&sorted, config.bucket_width_secs, &config.counters);

    if config.attribute_contexts {
        attribution::attribute_contexts(&mut buckets, contexts_seen);
    }

    let history = aggregate::history_records(url, &buckets, config);
    let summary = match config.policy {
        ReductionPolicy::Average => aggregate::average_summary(url, &buckets, config),
        ReductionPolicy::Delta => aggregate::delta_summary(url, &sorted, &buckets, config),
    };

    Some(RunReport {
        history,
        summary,
        snapshot_count: sorted.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::counters::TIMESTAMP;

    fn snap(timestamp: f64, context: &str, step: &str, script: f64) -> CounterSnapshot {
        CounterSnapshot {
            timestamp,
            context: context.to_string(),
            step: step.to_string(),
            values: BTreeMap::from([
                (TIMESTAMP.to_string(), timestamp),
                ("ScriptDuration".to_string(), script),
                ("TaskDuration".to_string(), script * 2.0),
            ]),
        }
    }

    fn frozen_log() -> Vec<CounterSnapshot> {
        vec![
            snap(100.00, "", "", 0.0),
            snap(100.04, "", "", 0.01),
            snap(100.12, "", "load", 0.03),
            snap(100.16, "frame-1", "load", 0.06),
            snap(100.35, "frame-1", "click", 0.10),
            snap(100.38, "frame-1", "click", 0.12),
        ]
    }

    #[test]
    fn empty_log_reduces_to_nothing() {
        assert!(reduce_run("u", &[], &[], &ReductionConfig::default()).is_none());
    }

    #[test]
    fn unusable_width_reduces_to_nothing() {
        let log = frozen_log();
        for width in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            let config = ReductionConfig {
                bucket_width_secs: width,
                ..ReductionConfig::default()
            };
            assert!(reduce_run("u", &log, &[], &config).is_none(), "width {width}");
        }
    }

    #[test]
    fn reduction_is_deterministic() {
        let log = frozen_log();
        let seen = vec!["main".to_string(), "frame-1".to_string()];
        let config = ReductionConfig::default();

        let first = reduce_run("https://example.test/", &log, &seen, &config).unwrap();
        let second = reduce_run("https://example.test/", &log, &seen, &config).unwrap();

        assert_eq!(
            serde_json::to_string(&first.history).unwrap(),
            serde_json::to_string(&second.history).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&first.summary).unwrap(),
            serde_json::to_string(&second.summary).unwrap()
        );
    }

    #[test]
    fn unsorted_log_is_reduced_in_time_order() {
        let mut log = frozen_log();
        log.swap(0, 5);
        log.swap(2, 3);
        let config = ReductionConfig::default();

        let report = reduce_run("u", &log, &[], &config).unwrap();

        let times: Vec<u64> = report.history.iter().map(|h| h.time).collect();
        assert_eq!(times, vec![0, 1, 3]);
        assert!((report.summary.counters["ScriptDuration"] - 0.12).abs() < 1e-12);
        assert_eq!(report.snapshot_count, 6);
    }

    #[test]
    fn early_buckets_are_attributed_to_first_context() {
        let seen = vec!["main".to_string(), "frame-1".to_string()];
        let report = reduce_run("u", &frozen_log(), &seen, &ReductionConfig::default()).unwrap();

        let contexts: Vec<&str> = report.history.iter().map(|h| h.context.as_str()).collect();
        assert_eq!(contexts, vec!["main", "main", "frame-1"]);
        assert_eq!(report.summary.context, "frame-1");
    }

    #[test]
    fn attribution_can_be_disabled() {
        let seen = vec!["main".to_string(), "frame-1".to_string()];
        let config = ReductionConfig {
            attribute_contexts: false,
            ..ReductionConfig::default()
        };
        let report = reduce_run("u", &frozen_log(), &seen, &config).unwrap();

        let contexts: Vec<&str> = report.history.iter().map(|h| h.context.as_str()).collect();
        assert_eq!(contexts, vec!["", "", "frame-1"]);
    }
}
