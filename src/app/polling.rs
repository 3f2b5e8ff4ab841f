use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};

use super::state::{ControllerEvent, Phase, PollOptions, SharedState};
use crate::api::GenerationApi;
use crate::error::GenerationError;
use crate::task::Status;
use crate::tracks::extract_tracks;

pub const NO_TRACKS_MESSAGE: &str = "No tracks found in response.";

/// Poll `task_id` until it reaches a terminal status, times out, or the
/// controller moves on to another epoch.
///
/// Requests are strictly sequential: the next tick is not awaited until the
/// previous poll has returned. A failed request is logged and the next tick
/// tries again.
pub(super) async fn run<A: GenerationApi>(
    api: Arc<A>,
    shared: SharedState,
    task_id: String,
    epoch: u64,
    options: PollOptions,
) {
    let started = Instant::now();
    let mut ticker = time::interval_at(started + options.interval, options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.is_current(epoch) {
            return;
        }

        if let Some(limit) = options.timeout {
            if started.elapsed() >= limit {
                let err = GenerationError::TimedOut { secs: limit.as_secs() };
                log::error!("Task {task_id}: {err}");
                shared.fail(epoch, err);
                return;
            }
        }

        let report = match api.poll_status(&task_id).await {
            Ok(report) => report,
            Err(e) => {
                log::warn!("Polling error for task {task_id}, will retry: {e}");
                continue;
            }
        };
        log::debug!("Task {task_id} status: {} ({:?})", report.code, report.status);

        let current = shared.transition(epoch, |state| {
            if let Some(task) = state.task.as_mut() {
                task.apply(&report);
            }
            let label = if report.code.is_empty() {
                "Processing...".to_string()
            } else {
                report.code.clone()
            };
            vec![
                ControllerEvent::StatusUpdate {
                    task_id: task_id.clone(),
                    status: report.status,
                    code: report.code.clone(),
                },
                ControllerEvent::Loading(format!("Status: {label}")),
            ]
        });
        if !current {
            log::debug!("Task {task_id} was superseded, stopping");
            return;
        }

        match report.status {
            Status::Succeeded => {
                collect_results(api.as_ref(), &shared, &task_id, epoch).await;
                return;
            }
            Status::Failed => {
                let message = report.failure_message();
                log::error!("Task {task_id} failed: {message}");
                shared.fail(epoch, GenerationError::Application(message));
                return;
            }
            Status::Pending | Status::Processing => {}
        }
    }
}

/// Fetch the details of a finished task and publish its tracks.
async fn collect_results<A: GenerationApi>(api: &A, shared: &SharedState, task_id: &str, epoch: u64) {
    let loading = ControllerEvent::Loading("Fetching results...".into());
    if !shared.transition(epoch, |_| vec![loading]) {
        return;
    }

    let details = match api.fetch_details(task_id).await {
        Ok(details) => details,
        Err(e) => {
            log::error!("Failed to fetch details for task {task_id}: {e}");
            shared.fail(epoch, e.into());
            return;
        }
    };

    let tracks = extract_tracks(&details.0);
    if tracks.is_empty() {
        log::error!("Task {task_id} finished without tracks");
        shared.fail(epoch, GenerationError::Application(NO_TRACKS_MESSAGE.into()));
        return;
    }

    log::info!("Task {task_id} produced {} track(s)", tracks.len());
    shared.transition(epoch, |state| {
        state.phase = Phase::Succeeded(tracks.clone());
        vec![ControllerEvent::TracksReady(tracks)]
    });
}
