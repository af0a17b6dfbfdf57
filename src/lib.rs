//! Performance-counter sampling for scripted page journeys.
//!
//! A [`CpuProbe`] listens to journey lifecycle events, polls a page's
//! cumulative counters while the journey runs, and on `analyse` reduces the
//! visit into per-bucket history rows and one summary row per visit.

pub mod counters;
pub mod db;
pub mod journey;
pub mod models;
pub mod reduction;
pub mod sampling;
pub mod settings;
pub mod storage;
mod utils;

pub use counters::{CounterError, CounterSnapshot, CounterSource, MetricsResponse, PageTarget};
pub use db::Database;
pub use journey::{AnalysisObserver, CpuProbe, JourneyEvent, MeasureStatus, RunState};
pub use reduction::{reduce_run, ReductionConfig, ReductionPolicy, RunReport};
pub use settings::{ProbeSettings, SettingsStore};
pub use storage::{MemorySink, RecordSink, StoreRow};
pub use utils::logging::init_logging;
