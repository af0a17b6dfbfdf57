use std::fmt;
use std::sync::Arc;

use crate::counters::PageTarget;

/// Lifecycle signals the journey driver feeds the probe, one at a time.
#[derive(Clone)]
pub enum JourneyEvent {
    Start(Arc<dyn PageTarget>),
    BeforeStep(String),
    AfterStep(String),
    NewContext(String),
    End,
    Error(String),
    /// Unrelated heavy work is about to run; counters should not be polled.
    ComputationWindowStart,
    ComputationWindowEnd,
}

impl JourneyEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            JourneyEvent::Start(_) => "start",
            JourneyEvent::BeforeStep(_) => "before_step",
            JourneyEvent::AfterStep(_) => "after_step",
            JourneyEvent::NewContext(_) => "new_context",
            JourneyEvent::End => "end",
            JourneyEvent::Error(_) => "error",
            JourneyEvent::ComputationWindowStart => "computation_window_start",
            JourneyEvent::ComputationWindowEnd => "computation_window_end",
        }
    }
}

impl fmt::Debug for JourneyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JourneyEvent::BeforeStep(name)
            | JourneyEvent::AfterStep(name)
            | JourneyEvent::NewContext(name)
            | JourneyEvent::Error(name) => write!(f, "{}({name:?})", self.kind()),
            _ => f.write_str(self.kind()),
        }
    }
}
