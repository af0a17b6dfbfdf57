use std::collections::BTreeMap;

use crate::counters::{CounterSnapshot, CounterSpec};
use crate::models::{HistoryRecord, SummaryRecord};

use super::bucket::Bucket;
use super::config::{ReductionConfig, ReductionPolicy};

/// One history row per bucket, in bucket discovery order.
pub fn history_records(url: &str, buckets: &[Bucket], config: &ReductionConfig) -> Vec<HistoryRecord> {
    buckets
        .iter()
        .map(|bucket| {
            let counters = tracked_values(&bucket.average_rates, &config.counters);
            let cpu = match config.policy {
                ReductionPolicy::Average => Some(duration_total(&counters, &config.counters)),
                ReductionPolicy::Delta => None,
            };
            HistoryRecord {
                url: url.to_string(),
                time: bucket.index,
                step: bucket.step.clone(),
                context: bucket.context.clone(),
                counters,
                cpu,
            }
        })
        .collect()
}

/// Mean across buckets of each bucket's average rate.
pub fn average_summary(url: &str, buckets: &[Bucket], config: &ReductionConfig) -> SummaryRecord {
    let bucket_count = buckets.len();
    let counters: BTreeMap<String, f64> = config
        .counters
        .iter()
        .map(|counter| {
            let sum: f64 = buckets
                .iter()
                .filter_map(|bucket| bucket.average_rates.get(&counter.name))
                .sum();
            let mean = if bucket_count == 0 {
                0.0
            } else {
                sum / bucket_count as f64
            };
            (counter.name.clone(), mean)
        })
        .collect();
    let cpu = duration_total(&counters, &config.counters);

    SummaryRecord {
        url: url.to_string(),
        context: last_context(buckets),
        time: last_index(buckets),
        counters,
        cpu: Some(cpu),
        task_duration_without_dev_tools: None,
    }
}

/// Last minus first cumulative reading per counter over the sorted raw log.
/// Each end is the nearest snapshot that actually carries the counter;
/// counters never reported are omitted.
pub fn delta_summary(
    url: &str,
    sorted: &[CounterSnapshot],
    buckets: &[Bucket],
    config: &ReductionConfig,
) -> SummaryRecord {
    let counters: BTreeMap<String, f64> = config
        .counters
        .iter()
        .filter_map(|counter| {
            let first = sorted.iter().find_map(|s| s.value(&counter.name))?;
            let last = sorted.iter().rev().find_map(|s| s.value(&counter.name))?;
            Some((counter.name.clone(), last - first))
        })
        .collect();

    let without_dev_tools = config
        .counters
        .iter()
        .filter(|counter| counter.counts_without_dev_tools())
        .filter_map(|counter| counters.get(&counter.name))
        .sum();

    SummaryRecord {
        url: url.to_string(),
        context: last_context(buckets),
        time: last_index(buckets),
        counters,
        cpu: None,
        task_duration_without_dev_tools: Some(without_dev_tools),
    }
}

fn tracked_values(values: &BTreeMap<String, f64>, counters: &[CounterSpec]) -> BTreeMap<String, f64> {
    counters
        .iter()
        .filter_map(|counter| {
            values
                .get(&counter.name)
                .filter(|value| value.is_finite())
                .map(|value| (counter.name.clone(), *value))
        })
        .collect()
}

fn duration_total(values: &BTreeMap<String, f64>, counters: &[CounterSpec]) -> f64 {
    counters
        .iter()
        .filter(|counter| counter.is_duration())
        .filter_map(|counter| values.get(&counter.name))
        .sum()
}

fn last_context(buckets: &[Bucket]) -> String {
    buckets
        .last()
        .map(|bucket| bucket.context.clone())
        .unwrap_or_default()
}

fn last_index(buckets: &[Bucket]) -> u64 {
    buckets.last().map(|bucket| bucket.index).unwrap_or(0)
}
