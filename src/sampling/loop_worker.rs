use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::counters::{CounterSnapshot, CounterSource};
use crate::journey::RunState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub type SharedSource = Arc<Mutex<Box<dyn CounterSource>>>;
pub type SharedRunState = Arc<Mutex<RunState>>;

/// Fetch, tag and append snapshots back to back until cancelled.
///
/// The next fetch is only issued once the previous one completed. The token
/// is checked before each fetch and again before appending; a fetch already
/// in flight is never aborted, its result is just dropped.
pub async fn polling_loop(
    run_id: Uuid,
    source: SharedSource,
    state: SharedRunState,
    cancel_token: CancellationToken,
) {
    let mut accepted: u64 = 0;

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let fetched = {
            let mut session = source.lock().await;
            // An older loop may have held the session until after we were cancelled.
            if cancel_token.is_cancelled() {
                break;
            }
            session.fetch_snapshot().await
        };

        let mut run = state.lock().await;
        if !run.is_current(run_id) {
            log_debug!("run {run_id} replaced; dropping polling loop");
            break;
        }

        match fetched {
            Ok(response) => {
                run.has_value = true;
                if cancel_token.is_cancelled() || !run.is_measuring() {
                    log_debug!("snapshot for run {run_id} fetched after pause; dropped");
                    break;
                }

                match CounterSnapshot::from_response(&response, &run.current_context, &run.current_step) {
                    Some(snapshot) => {
                        run.snapshots.push(snapshot);
                        accepted += 1;
                    }
                    None => log_warn!("counter response without Timestamp dropped (run {run_id})"),
                }
            }
            Err(err) => {
                if cancel_token.is_cancelled() {
                    log_debug!("fetch failed after pause for run {run_id}: {err}");
                } else {
                    log_warn!("counter fetch failed for run {run_id}, ending measurement: {err}");
                    run.fetch_failed();
                }
                break;
            }
        }

        drop(run);
        tokio::task::yield_now().await;
    }

    log_info!("polling loop for run {run_id} exiting after {accepted} snapshots");
}
