use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    counters::{PageTarget, TimeDomain, CPU, TASK_DURATION_WITHOUT_DEV_TOOLS},
    models::{HISTORY_STORE, SUMMARY_STORE},
    reduction::{reduce_run, ReductionPolicy, RunReport},
    sampling::{Poller, SharedRunState},
    settings::ProbeSettings,
    storage::{RecordSink, StoreColumns},
};

use super::{AnalysisObserver, JourneyEvent, MeasureStatus, RunState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Drives counter sampling for a journey and turns each visit into records.
#[derive(Clone)]
pub struct CpuProbe {
    settings: Arc<ProbeSettings>,
    state: SharedRunState,
    poller: Arc<Mutex<Poller>>,
    sink: Arc<dyn RecordSink>,
    observers: Arc<RwLock<Vec<Arc<dyn AnalysisObserver>>>>,
}

impl CpuProbe {
    /// Build a probe over `sink`. Settings that could not bucket a run
    /// (non-positive or non-finite width, no counters) are rejected.
    pub fn new(settings: ProbeSettings, sink: Arc<dyn RecordSink>) -> Result<Self> {
        settings.validate().context("invalid probe settings")?;
        Ok(Self {
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(RunState::new())),
            poller: Arc::new(Mutex::new(Poller::new())),
            sink,
            observers: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    pub fn register_observer(&self, observer: Arc<dyn AnalysisObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    pub async fn get_state(&self) -> RunState {
        self.state.lock().await.clone()
    }

    pub async fn status(&self) -> MeasureStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot_count(&self) -> usize {
        self.state.lock().await.snapshots.len()
    }

    /// Declare both stores on the sink. Call once before the first analysis.
    pub async fn install(&self) -> Result<()> {
        self.sink
            .install_store(SUMMARY_STORE, &self.summary_columns())
            .await
            .context("failed to install summary store")?;
        self.sink
            .install_store(HISTORY_STORE, &self.history_columns())
            .await
            .context("failed to install history store")?;

        self.notify(|observer| observer.on_install());
        Ok(())
    }

    pub async fn handle_event(&self, event: JourneyEvent) -> Result<()> {
        log::debug!("journey event {event:?}");
        match event {
            JourneyEvent::Start(page) => self.start_measure(page.as_ref()).await?,
            JourneyEvent::BeforeStep(name) | JourneyEvent::AfterStep(name) => {
                self.state.lock().await.set_step(&name);
                if self.settings.resume_on_step {
                    self.resume_measure().await;
                }
            }
            JourneyEvent::NewContext(name) => {
                self.state.lock().await.enter_context(&name);
            }
            JourneyEvent::End => self.stop_measure(true).await,
            JourneyEvent::Error(reason) => {
                log_warn!("journey failed, analysing collected counters anyway: {reason}");
                self.stop_measure(true).await;
            }
            JourneyEvent::ComputationWindowStart => self.pause_measure().await,
            JourneyEvent::ComputationWindowEnd => {
                if self.settings.resume_after_computation {
                    self.resume_measure().await;
                }
            }
        }
        Ok(())
    }

    /// Open the page's counter session, reset the run and start polling.
    /// A session that cannot be opened is returned as an error and nothing
    /// is measured.
    pub async fn start_measure(&self, page: &dyn PageTarget) -> Result<()> {
        let mut source = page
            .open_counter_session()
            .await
            .context("failed to open counter session for journey")?;

        let time_domain = TimeDomain::TimeTicks;
        if let Err(err) = source.enable_counters(time_domain).await {
            log_warn!(
                "enabling counters ({}) failed, fetches will tell: {err}",
                time_domain.as_str()
            );
        }

        let run_id = Uuid::new_v4();
        {
            let mut state = self.state.lock().await;
            state.begin_run(run_id, Utc::now(), self.settings.keep_session_contexts);
        }

        let mut poller = self.poller.lock().await;
        poller.attach(source);
        poller.start(run_id, self.state.clone())?;

        log_info!("measurement started for run {run_id}");
        Ok(())
    }

    pub async fn pause_measure(&self) {
        let paused = self.state.lock().await.pause();
        if paused {
            self.poller.lock().await.pause();
        }
    }

    /// Back to Measuring from Paused, restarting the polling loop.
    pub async fn resume_measure(&self) {
        let mut poller = self.poller.lock().await;
        if !poller.has_source() {
            return;
        }

        let run_id = {
            let mut state = self.state.lock().await;
            let current = state.run_id;
            match current {
                Some(run_id) if state.resume() => run_id,
                _ => return,
            }
        };

        if let Err(err) = poller.start(run_id, self.state.clone()) {
            log_error!("failed to resume polling for run {run_id}: {err:?}");
            self.state.lock().await.pause();
        }
    }

    pub async fn stop_measure(&self, has_value: bool) {
        self.state.lock().await.stop(has_value);
        self.poller.lock().await.pause();
    }

    /// Forget contexts carried across visits; the next visit starts a new session.
    pub async fn begin_session(&self) {
        self.state.lock().await.clear_session_contexts();
    }

    /// Reduce the current visit and hand the records to the sink.
    ///
    /// Returns false without touching the sink when no counters were ever
    /// sampled. Otherwise measuring resumes afterwards (unless configured
    /// off) so pipelined visits keep sampling.
    ///
    /// Writes are not transactional: if the sink fails partway, rows already
    /// added stay and the call returns false. Analysing the same visit again
    /// appends a second copy.
    pub async fn analyse(&self, url: &str) -> bool {
        let (snapshots, contexts_seen) = {
            let mut state = self.state.lock().await;
            state.force_pause();
            if !state.has_value || state.snapshots.is_empty() {
                drop(state);
                self.poller.lock().await.pause();
                log_info!("no counters sampled for {url}; nothing to analyse");
                return false;
            }
            (state.snapshots.clone(), state.contexts_seen.clone())
        };
        self.poller.lock().await.pause();

        self.notify(|observer| observer.before_analyse(url));

        let success = match reduce_run(url, &snapshots, &contexts_seen, &self.settings.reduction()) {
            Some(report) => {
                let written = self.write_report(&report).await;
                match serde_json::to_string(&report.summary) {
                    Ok(summary) => log_info!(
                        "CPU result ({}) for {url}: {summary}",
                        self.settings.policy.as_str()
                    ),
                    Err(err) => log_warn!("failed to render CPU result for {url}: {err}"),
                }
                self.notify(|observer| observer.on_result(url, &report));

                match written {
                    Ok(()) => true,
                    Err(err) => {
                        log_error!("failed to store CPU records for {url}: {err:?}");
                        false
                    }
                }
            }
            None => false,
        };

        self.notify(|observer| observer.after_analyse(url, success));

        if self.settings.resume_after_analyse {
            self.resume_measure().await;
        }

        success
    }

    /// Wait for the polling loop to exit on its own.
    pub async fn wait_for_poller(&self) -> Result<()> {
        self.poller.lock().await.join().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        let has_value = self.state.lock().await.has_value;
        self.stop_measure(has_value).await;
        self.poller.lock().await.shutdown().await
    }

    /// Rows are rendered up front so a serialization error writes nothing.
    async fn write_report(&self, report: &RunReport) -> Result<()> {
        let history = report
            .history
            .iter()
            .map(|record| record.to_row())
            .collect::<Result<Vec<_>>>()?;
        let summary = report.summary.to_row()?;

        for row in history {
            self.sink
                .add(HISTORY_STORE, row)
                .await
                .context("failed to add history row")?;
        }
        self.sink
            .add(SUMMARY_STORE, summary)
            .await
            .context("failed to add summary row")?;
        Ok(())
    }

    fn history_columns(&self) -> StoreColumns {
        let mut columns = identity_columns(&["url", "time", "step", "context"]);
        if self.settings.policy == ReductionPolicy::Average {
            columns.push((CPU.to_string(), "CPU time".to_string()));
        }
        columns.extend(self.counter_columns());
        columns
    }

    fn summary_columns(&self) -> StoreColumns {
        let mut columns = identity_columns(&["url", "context", "time"]);
        columns.extend(self.counter_columns());
        match self.settings.policy {
            ReductionPolicy::Average => columns.push((CPU.to_string(), "CPU time".to_string())),
            ReductionPolicy::Delta => columns.push((
                TASK_DURATION_WITHOUT_DEV_TOOLS.to_string(),
                "Task Duration Without Dev Tools".to_string(),
            )),
        }
        columns
    }

    fn counter_columns(&self) -> StoreColumns {
        self.settings
            .counters
            .iter()
            .map(|counter| (counter.name.clone(), counter.label.clone()))
            .collect()
    }

    fn notify<F>(&self, hook: F)
    where
        F: Fn(&dyn AnalysisObserver),
    {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for observer in &observers {
            hook(observer.as_ref());
        }
    }
}

fn identity_columns(names: &[&str]) -> StoreColumns {
    names
        .iter()
        .map(|name| {
            let label = match *name {
                "url" => "Url",
                "time" => "Time",
                "step" => "Step",
                "context" => "Context",
                other => other,
            };
            (name.to_string(), label.to_string())
        })
        .collect()
}
