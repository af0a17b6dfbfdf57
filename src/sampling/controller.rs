use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::counters::CounterSource;

use super::loop_worker::{polling_loop, SharedRunState, SharedSource};

/// Owns the counter session of the current visit and the polling task.
pub struct Poller {
    source: Option<SharedSource>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            source: None,
            handle: None,
            cancel_token: None,
        }
    }

    /// Replace the counter session; any running loop is told to stop.
    pub fn attach(&mut self, source: Box<dyn CounterSource>) {
        self.pause();
        self.handle = None;
        self.source = Some(Arc::new(Mutex::new(source)));
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Spawn a fresh polling loop for `run_id`. A previous loop still waiting
    /// on its fetch is cancelled and left to finish on its own; the session
    /// mutex keeps their fetches from overlapping.
    pub fn start(&mut self, run_id: Uuid, state: SharedRunState) -> Result<()> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| anyhow!("no counter session attached"))?;

        self.pause();

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(polling_loop(run_id, source, state, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Polling started for run {run_id}");
        Ok(())
    }

    /// Signal the loop to stop before its next fetch.
    pub fn pause(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }

    /// Wait for the current loop to exit on its own (cancellation or fetch failure).
    pub async fn join(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.await.context("polling loop task failed to join")
        } else {
            Ok(())
        }
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.pause();
        self.source = None;
        self.join().await
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}
