use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::counters::{default_counters, CounterSpec};

/// How a whole run is folded into its summary record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReductionPolicy {
    /// Mean of the per-bucket average rates, with a `cpu` total.
    Average,
    /// Last minus first cumulative reading, with `TaskDurationWithoutDevTools`.
    Delta,
}

impl ReductionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionPolicy::Average => "average",
            ReductionPolicy::Delta => "delta",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "average" => Ok(ReductionPolicy::Average),
            "delta" => Ok(ReductionPolicy::Delta),
            other => bail!("unknown reduction policy '{other}'"),
        }
    }
}

impl Default for ReductionPolicy {
    fn default() -> Self {
        ReductionPolicy::Delta
    }
}

/// Tunables for bucketing and aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionConfig {
    /// Width of one history bucket, in the source's timestamp unit (seconds).
    pub bucket_width_secs: f64,
    pub policy: ReductionPolicy,
    /// Remap bucket context labels onto the run-wide context order.
    pub attribute_contexts: bool,
    pub counters: Vec<CounterSpec>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            bucket_width_secs: 0.1,
            policy: ReductionPolicy::default(),
            attribute_contexts: true,
            counters: default_counters(),
        }
    }
}

impl ReductionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.bucket_width_secs.is_finite() || self.bucket_width_secs <= 0.0 {
            bail!(
                "bucket width must be a positive number, got {}",
                self.bucket_width_secs
            );
        }
        if self.counters.is_empty() {
            bail!("at least one counter must be tracked");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parse_is_case_insensitive() {
        assert_eq!(ReductionPolicy::parse("Average").unwrap(), ReductionPolicy::Average);
        assert_eq!(ReductionPolicy::parse(" delta ").unwrap(), ReductionPolicy::Delta);
        assert!(ReductionPolicy::parse("median").is_err());
    }

    #[test]
    fn validate_rejects_bad_width() {
        let mut config = ReductionConfig::default();
        assert!(config.validate().is_ok());

        config.bucket_width_secs = 0.0;
        assert!(config.validate().is_err());
        config.bucket_width_secs = f64::NAN;
        assert!(config.validate().is_err());
    }
}
