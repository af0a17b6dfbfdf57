use crate::reduction::RunReport;

/// Hooks invoked synchronously, in registration order, around each analysis.
pub trait AnalysisObserver: Send + Sync {
    /// Both stores have been installed on the sink.
    fn on_install(&self) {}

    fn before_analyse(&self, _url: &str) {}

    fn on_result(&self, _url: &str, _report: &RunReport) {}

    /// `success` is what `analyse` is about to return.
    fn after_analyse(&self, _url: &str, _success: bool) {}
}
