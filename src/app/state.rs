use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::GenerationError;
use crate::task::{GenerationTask, Status};
use crate::tracks::Track;

/// Events sent from the controller to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// Progress text for a loading indicator.
    Loading(String),
    TaskCreated(String),
    StatusUpdate {
        task_id: String,
        status: Status,
        code: String,
    },
    TracksReady(Vec<Track>),
    /// Terminal or rejected; `Display` gives the user-facing message.
    Error(GenerationError),
}

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Uploading,
    Polling,
    Succeeded(Vec<Track>),
    Failed(GenerationError),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded(_) | Phase::Failed(_))
    }
}

/// How the status endpoint is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Maximum time spent polling one task. `None` polls until a terminal status.
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

pub(crate) struct ControllerState {
    pub phase: Phase,
    pub task: Option<GenerationTask>,
    /// Bumped on every supersession; work tagged with an older epoch is stale.
    pub epoch: u64,
}

/// State shared between the controller and its poll task.
#[derive(Clone)]
pub(crate) struct SharedState {
    inner: Arc<Mutex<ControllerState>>,
    events: async_channel::Sender<ControllerEvent>,
}

impl SharedState {
    pub fn new(events: async_channel::Sender<ControllerEvent>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControllerState {
                phase: Phase::Idle,
                task: None,
                epoch: 0,
            })),
            events,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discard the current task and return to `Idle` under a fresh epoch.
    pub fn supersede(&self) -> u64 {
        let mut state = self.lock();
        state.epoch += 1;
        state.task = None;
        state.phase = Phase::Idle;
        state.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Apply `f` and publish the events it returns, but only while `epoch` is
    /// still current. Both happen under the lock, so nothing from a superseded
    /// task can follow the first event of its replacement.
    pub fn transition<F>(&self, epoch: u64, f: F) -> bool
    where
        F: FnOnce(&mut ControllerState) -> Vec<ControllerEvent>,
    {
        let mut state = self.lock();
        if state.epoch != epoch {
            return false;
        }
        for event in f(&mut *state) {
            self.send(event);
        }
        true
    }

    /// Move to `Failed(err)` and publish it.
    pub fn fail(&self, epoch: u64, err: GenerationError) -> bool {
        self.transition(epoch, |state| {
            if let Some(task) = state.task.as_mut() {
                task.status = Status::Failed;
                task.error_message.get_or_insert_with(|| err.to_string());
            }
            state.phase = Phase::Failed(err.clone());
            vec![ControllerEvent::Error(err)]
        })
    }

    /// Publish without touching state.
    pub fn send(&self, event: ControllerEvent) {
        if let Err(e) = self.events.try_send(event) {
            if !e.is_closed() {
                log::warn!("Dropping controller event, channel full: {:?}", e.into_inner());
            }
        }
    }
}
