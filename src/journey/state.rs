use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::counters::CounterSnapshot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MeasureStatus {
    Idle,
    Measuring,
    Paused,
    Stopped,
}

impl Default for MeasureStatus {
    fn default() -> Self {
        MeasureStatus::Idle
    }
}

/// Flags, labels and snapshot log of the visit being measured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub status: MeasureStatus,
    /// Set once a counter fetch succeeded, or when the journey ends.
    pub has_value: bool,
    /// Distinct context labels in first-seen order.
    pub contexts_seen: Vec<String>,
    pub current_context: String,
    pub current_step: String,
    pub snapshots: Vec<CounterSnapshot>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_measuring(&self) -> bool {
        self.status == MeasureStatus::Measuring
    }

    pub fn is_paused(&self) -> bool {
        !self.is_measuring()
    }

    pub fn is_current(&self, run_id: Uuid) -> bool {
        self.run_id == Some(run_id)
    }

    /// Reset for a new visit. `keep_contexts` carries the context list over
    /// from earlier visits of the same session.
    pub fn begin_run(&mut self, run_id: Uuid, started_at: DateTime<Utc>, keep_contexts: bool) {
        let contexts_seen = if keep_contexts {
            std::mem::take(&mut self.contexts_seen)
        } else {
            Vec::new()
        };

        *self = Self {
            run_id: Some(run_id),
            started_at: Some(started_at),
            status: MeasureStatus::Measuring,
            has_value: false,
            contexts_seen,
            current_context: String::new(),
            current_step: String::new(),
            snapshots: Vec::new(),
        };
    }

    pub fn set_step(&mut self, step: &str) {
        self.current_step = step.to_string();
    }

    /// Returns true when the context had not been seen before.
    pub fn enter_context(&mut self, context: &str) -> bool {
        self.current_context = context.to_string();
        if self.contexts_seen.iter().any(|seen| seen == context) {
            return false;
        }
        self.contexts_seen.push(context.to_string());
        true
    }

    /// Measuring → Paused. Returns true on a transition.
    pub fn pause(&mut self) -> bool {
        if self.status == MeasureStatus::Measuring {
            self.status = MeasureStatus::Paused;
            true
        } else {
            false
        }
    }

    /// Paused from any active status; used before analysis.
    pub fn force_pause(&mut self) {
        if self.status != MeasureStatus::Idle {
            self.status = MeasureStatus::Paused;
        }
    }

    /// Paused → Measuring. Returns true on a transition.
    pub fn resume(&mut self) -> bool {
        if self.status == MeasureStatus::Paused {
            self.status = MeasureStatus::Measuring;
            true
        } else {
            false
        }
    }

    pub fn stop(&mut self, has_value: bool) {
        if self.status != MeasureStatus::Idle {
            self.status = MeasureStatus::Stopped;
        }
        self.has_value = has_value;
    }

    /// A fetch failed: the run ends with what was collected so far.
    pub fn fetch_failed(&mut self) {
        self.status = MeasureStatus::Stopped;
    }

    pub fn clear_session_contexts(&mut self) {
        self.contexts_seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_run_resets_everything_but_kept_contexts() {
        let mut state = RunState::new();
        state.begin_run(Uuid::new_v4(), Utc::now(), false);
        state.enter_context("main");
        state.set_step("login");
        state.has_value = true;

        let next = Uuid::new_v4();
        state.begin_run(next, Utc::now(), true);
        assert!(state.is_current(next));
        assert_eq!(state.status, MeasureStatus::Measuring);
        assert!(!state.has_value);
        assert_eq!(state.contexts_seen, vec!["main".to_string()]);
        assert!(state.current_context.is_empty());
        assert!(state.current_step.is_empty());

        state.begin_run(Uuid::new_v4(), Utc::now(), false);
        assert!(state.contexts_seen.is_empty());
    }

    #[test]
    fn contexts_are_recorded_once_in_first_seen_order() {
        let mut state = RunState::new();
        assert!(state.enter_context("a"));
        assert!(state.enter_context("b"));
        assert!(!state.enter_context("a"));
        assert_eq!(state.contexts_seen, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(state.current_context, "a");
    }

    #[test]
    fn transitions() {
        let mut state = RunState::new();
        assert!(!state.pause());
        state.force_pause();
        assert_eq!(state.status, MeasureStatus::Idle);

        state.begin_run(Uuid::new_v4(), Utc::now(), false);
        assert!(state.pause());
        assert!(state.is_paused());
        assert!(!state.pause());
        assert!(state.resume());
        assert!(!state.resume());

        state.stop(true);
        assert_eq!(state.status, MeasureStatus::Stopped);
        assert!(!state.resume());
        state.force_pause();
        assert!(state.resume());
    }

    #[test]
    fn fetch_failure_keeps_has_value() {
        let mut state = RunState::new();
        state.begin_run(Uuid::new_v4(), Utc::now(), false);
        state.fetch_failed();
        assert_eq!(state.status, MeasureStatus::Stopped);
        assert!(!state.has_value);
    }
}
