use std::sync::Arc;

use tokio::task::JoinHandle;

use super::polling;
use super::state::{ControllerEvent, Phase, PollOptions, SharedState};
use crate::api::{GenerationApi, StartedTask};
use crate::error::{GenerationError, ValidationError};
use crate::settings::GenerationSettings;
use crate::task::GenerationTask;
use crate::validator::{validate, AudioFile};

const MISSING_TASK_ID: &str = "No task ID received from server";

/// Drives one generation at a time: upload, poll, collect tracks.
///
/// Progress is published as [`ControllerEvent`]s on the sender given to
/// [`GenerationController::new`]; the controller never reads anything back
/// from the presentation side. Pass the sending half of an unbounded channel.
///
/// A new [`submit`](Self::submit) cancels whatever the previous one left
/// running. Dropping the controller cancels it too.
pub struct GenerationController<A: GenerationApi> {
    api: Arc<A>,
    options: PollOptions,
    shared: SharedState,
    poll_task: Option<JoinHandle<()>>,
}

impl<A: GenerationApi> GenerationController<A> {
    pub fn new(
        api: Arc<A>,
        options: PollOptions,
        events: async_channel::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            api,
            options,
            shared: SharedState::new(events),
            poll_task: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase.clone()
    }

    pub fn task(&self) -> Option<GenerationTask> {
        self.shared.lock().task.clone()
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    /// Start a generation and begin polling it. Returns the task id.
    ///
    /// Invalid input is reported (and published as an `Error` event) without
    /// disturbing a generation that is already running. Otherwise the previous
    /// task is cancelled before the upload starts. Dropping the returned future
    /// before the upload finishes leaves the controller in
    /// `Failed(Cancelled)`. Must be called from within a tokio runtime.
    pub async fn submit(
        &mut self,
        file: Option<&AudioFile>,
        prompt: &str,
        settings: GenerationSettings,
    ) -> Result<String, GenerationError> {
        let file = match check_inputs(file, prompt) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Submission rejected: {e}");
                self.shared.send(ControllerEvent::Error(e.clone()));
                return Err(e);
            }
        };
        let prompt = prompt.trim();

        let epoch = self.cancel_running();
        self.shared.transition(epoch, |state| {
            state.phase = Phase::Uploading;
            vec![ControllerEvent::Loading("Starting generation...".into())]
        });
        log::info!("Starting generation for {} with prompt {prompt:?}", file.name);

        let guard = UploadGuard::new(&self.shared, epoch);
        let started = self.api.start_generation(file, prompt, &settings).await;
        guard.disarm();

        let task_id = match started {
            Ok(StartedTask { task_id: Some(id) }) if !id.trim().is_empty() => id.trim().to_string(),
            Ok(_) => {
                log::error!("{MISSING_TASK_ID}");
                let err = GenerationError::Application(MISSING_TASK_ID.into());
                self.shared.fail(epoch, err.clone());
                return Err(err);
            }
            Err(e) => {
                log::error!("Upload failed: {e}");
                let err = GenerationError::from(e);
                self.shared.fail(epoch, err.clone());
                return Err(err);
            }
        };

        log::info!("Task {task_id} created, polling every {:?}", self.options.interval);
        let task = GenerationTask::new(task_id.clone());
        self.shared.transition(epoch, |state| {
            state.task = Some(task);
            state.phase = Phase::Polling;
            vec![ControllerEvent::TaskCreated(task_id.clone())]
        });

        self.poll_task = Some(tokio::spawn(polling::run(
            self.api.clone(),
            self.shared.clone(),
            task_id.clone(),
            epoch,
            self.options,
        )));
        Ok(task_id)
    }

    /// Cancel any running generation and return to `Idle`.
    pub fn reset(&mut self) {
        self.cancel_running();
        log::info!("Controller reset");
    }

    /// Abort the poll task and open a new epoch. Returns the new epoch.
    fn cancel_running(&mut self) -> u64 {
        if let Some(handle) = self.poll_task.take() {
            handle.abort();
        }
        self.shared.supersede()
    }
}

impl<A: GenerationApi> Drop for GenerationController<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_task.take() {
            handle.abort();
        }
    }
}

/// Fails the epoch with `Cancelled` if dropped while still armed, which only
/// happens when the `submit` future is dropped mid-upload.
struct UploadGuard<'a> {
    shared: &'a SharedState,
    epoch: u64,
    armed: bool,
}

impl<'a> UploadGuard<'a> {
    fn new(shared: &'a SharedState, epoch: u64) -> Self {
        Self {
            shared,
            epoch,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Upload abandoned before the server answered");
            self.shared.fail(self.epoch, GenerationError::Cancelled);
        }
    }
}

fn check_inputs<'a>(
    file: Option<&'a AudioFile>,
    prompt: &str,
) -> Result<&'a AudioFile, GenerationError> {
    validate(file)?;
    let file = file.ok_or(ValidationError::NoFile)?;
    if prompt.trim().is_empty() {
        return Err(GenerationError::EmptyPrompt);
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_upload_guard_fails_the_epoch() {
        let (tx, rx) = async_channel::unbounded();
        let shared = SharedState::new(tx);
        let epoch = shared.supersede();

        UploadGuard::new(&shared, epoch).disarm();
        assert_eq!(shared.lock().phase, Phase::Idle);

        drop(UploadGuard::new(&shared, epoch));
        assert_eq!(shared.lock().phase, Phase::Failed(GenerationError::Cancelled));
        assert_eq!(rx.try_recv().unwrap(), ControllerEvent::Error(GenerationError::Cancelled));
    }

    #[test]
    fn inputs_are_checked_file_first() {
        let file = AudioFile::from_bytes("a.mp3", "audio/mpeg", vec![1, 2, 3]);
        assert!(check_inputs(Some(&file), "lofi chill").is_ok());
        assert_eq!(check_inputs(Some(&file), "   ").unwrap_err(), GenerationError::EmptyPrompt);
        assert_eq!(
            check_inputs(None, "").unwrap_err(),
            GenerationError::Validation(ValidationError::NoFile)
        );
    }
}
