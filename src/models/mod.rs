pub mod records;

pub use records::{HistoryRecord, SummaryRecord, HISTORY_STORE, SUMMARY_STORE};
