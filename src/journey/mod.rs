pub mod controller;
pub mod events;
pub mod observers;
pub mod state;

pub use controller::CpuProbe;
pub use events::JourneyEvent;
pub use observers::AnalysisObserver;
pub use state::{MeasureStatus, RunState};
