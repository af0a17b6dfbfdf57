use std::collections::{BTreeMap, HashMap};

use crate::counters::{CounterSnapshot, CounterSpec};

/// Absorbs float error so a timestamp sitting exactly on a bucket edge
/// (e.g. 0.3 with width 0.1) lands in the later bucket.
const BUCKET_EPSILON: f64 = 1e-9;

/// Snapshots sharing one time window, reduced to per-counter rates.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub index: u64,
    /// Labels of the first snapshot that landed in the bucket.
    pub context: String,
    pub step: String,
    pub snapshot_count: usize,
    /// Forward differences, one map per adjacent snapshot pair.
    pub rate_samples: Vec<BTreeMap<String, f64>>,
    pub average_rates: BTreeMap<String, f64>,
}

/// Stable ascending sort by timestamp; ties keep arrival order.
pub fn sort_snapshots(snapshots: &[CounterSnapshot]) -> Vec<CounterSnapshot> {
    let mut sorted = snapshots.to_vec();
    sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    sorted
}

pub fn bucket_index(timestamp: f64, first_timestamp: f64, width: f64) -> u64 {
    if !(width > 0.0) {
        return 0;
    }
    let scaled = (timestamp - first_timestamp) / width + BUCKET_EPSILON;
    if scaled <= 0.0 || !scaled.is_finite() {
        return 0;
    }
    scaled.floor() as u64
}

/// Group `sorted` into buckets anchored at the first snapshot. Buckets come
/// back in discovery order.
pub fn bucketize(sorted: &[CounterSnapshot], width: f64, counters: &[CounterSpec]) -> Vec<Bucket> {
    let Some(first) = sorted.first() else {
        return Vec::new();
    };
    let first_timestamp = first.timestamp;

    let mut positions: HashMap<u64, usize> = HashMap::new();
    let mut groups: Vec<(u64, Vec<&CounterSnapshot>)> = Vec::new();

    for snapshot in sorted {
        let index = bucket_index(snapshot.timestamp, first_timestamp, width);
        match positions.get(&index) {
            Some(&position) => groups[position].1.push(snapshot),
            None => {
                positions.insert(index, groups.len());
                groups.push((index, vec![snapshot]));
            }
        }
    }

    groups
        .into_iter()
        .map(|(index, members)| {
            let rate_samples = derivative(&members, counters);
            let average_rates = average_rates(&rate_samples, counters);
            Bucket {
                index,
                context: members[0].context.clone(),
                step: members[0].step.clone(),
                snapshot_count: members.len(),
                rate_samples,
                average_rates,
            }
        })
        .collect()
}

/// Forward differences of each tracked counter between consecutive
/// snapshots. A counter missing on either side is left out of that sample.
pub fn derivative(
    snapshots: &[&CounterSnapshot],
    counters: &[CounterSpec],
) -> Vec<BTreeMap<String, f64>> {
    snapshots
        .windows(2)
        .map(|pair| {
            counters
                .iter()
                .filter_map(|counter| {
                    let previous = pair[0].value(&counter.name)?;
                    let current = pair[1].value(&counter.name)?;
                    Some((counter.name.clone(), current - previous))
                })
                .collect()
        })
        .collect()
}

/// Mean of the present samples per counter; 0 when a counter has none
/// (always the case for a single-snapshot bucket).
pub fn average_rates(
    samples: &[BTreeMap<String, f64>],
    counters: &[CounterSpec],
) -> BTreeMap<String, f64> {
    counters
        .iter()
        .map(|counter| {
            let (sum, count) = samples
                .iter()
                .filter_map(|sample| sample.get(&counter.name))
                .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
            let average = if count == 0 { 0.0 } else { sum / count as f64 };
            (counter.name.clone(), average)
        })
        .collect()
}
