mod types;

pub use types::{
    default_counters, CounterSnapshot, CounterSpec, MetricEntry, MetricsResponse, TimeDomain, CPU,
    DEV_TOOLS_COMMAND_DURATION, TASK_DURATION, TASK_DURATION_WITHOUT_DEV_TOOLS, TIMESTAMP,
};

use std::collections::VecDeque;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

/// Failures surfaced by a counter session. None of them are retried here.
#[derive(Error, Debug)]
pub enum CounterError {
    #[error("failed to open counter session: {0}")]
    Connect(String),

    #[error("counter protocol error: {0}")]
    Protocol(String),
}

/// A protocol session that can report cumulative performance counters.
#[async_trait]
pub trait CounterSource: Send {
    /// Fire-and-forget: a failure here only shows up through later fetches.
    async fn enable_counters(&mut self, time_domain: TimeDomain) -> Result<(), CounterError>;

    async fn fetch_snapshot(&mut self) -> Result<MetricsResponse, CounterError>;
}

/// The page being driven by the journey; opens the counter session.
#[async_trait]
pub trait PageTarget: Send + Sync {
    async fn open_counter_session(&self) -> Result<Box<dyn CounterSource>, CounterError>;
}

/// Replays a recorded transcript of counter responses, one per fetch.
/// Fails with a protocol error once the transcript is exhausted.
#[derive(Debug, Default)]
pub struct ReplaySource {
    responses: VecDeque<MetricsResponse>,
    enabled_with: Option<TimeDomain>,
}

impl ReplaySource {
    pub fn new(responses: Vec<MetricsResponse>) -> Self {
        Self {
            responses: responses.into(),
            enabled_with: None,
        }
    }

    /// One JSON `{"metrics": [...]}` object per non-empty line.
    pub fn from_json_lines(transcript: &str) -> Result<Self> {
        let responses = transcript
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str::<MetricsResponse>(line)
                    .with_context(|| format!("invalid counter response on line {}", index + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(responses))
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }

    pub fn enabled_with(&self) -> Option<TimeDomain> {
        self.enabled_with
    }
}

#[async_trait]
impl CounterSource for ReplaySource {
    async fn enable_counters(&mut self, time_domain: TimeDomain) -> Result<(), CounterError> {
        self.enabled_with = Some(time_domain);
        Ok(())
    }

    async fn fetch_snapshot(&mut self) -> Result<MetricsResponse, CounterError> {
        self.responses
            .pop_front()
            .ok_or_else(|| CounterError::Protocol("replay transcript exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replay_source_yields_in_order_then_fails() {
        let transcript = "\
{\"metrics\":[{\"name\":\"Timestamp\",\"value\":1.0}]}

{\"metrics\":[{\"name\":\"Timestamp\",\"value\":1.5}]}
";
        let mut source = ReplaySource::from_json_lines(transcript).unwrap();
        assert_eq!(source.remaining(), 2);

        source.enable_counters(TimeDomain::TimeTicks).await.unwrap();
        assert_eq!(source.enabled_with(), Some(TimeDomain::TimeTicks));

        let first = source.fetch_snapshot().await.unwrap();
        assert_eq!(first.values().get(TIMESTAMP), Some(&1.0));
        let second = source.fetch_snapshot().await.unwrap();
        assert_eq!(second.values().get(TIMESTAMP), Some(&1.5));

        let err = source.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, CounterError::Protocol(_)));
    }

    #[test]
    fn replay_source_reports_bad_line() {
        let err = ReplaySource::from_json_lines("{\"metrics\": []}\nnot json").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
