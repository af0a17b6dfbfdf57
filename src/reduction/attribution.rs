use super::bucket::Bucket;

/// Remap bucket context labels onto the run-wide context order.
///
/// The n-th distinct label seen among the buckets becomes the n-th entry of
/// `contexts_seen`. Labels past the end of `contexts_seen` fall back to its
/// last entry. With no recorded contexts the labels are left untouched.
pub fn attribute_contexts(buckets: &mut [Bucket], contexts_seen: &[String]) {
    let Some(fallback) = contexts_seen.last() else {
        return;
    };

    let distinct = distinct_labels(buckets);
    for bucket in buckets.iter_mut() {
        bucket.context = distinct
            .iter()
            .position(|label| *label == bucket.context)
            .and_then(|position| contexts_seen.get(position))
            .unwrap_or(fallback)
            .clone();
    }
}

/// Distinct bucket context labels in first-seen order.
pub fn distinct_labels(buckets: &[Bucket]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for bucket in buckets {
        if !labels.contains(&bucket.context) {
            labels.push(bucket.context.clone());
        }
    }
    labels
}
