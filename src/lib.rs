//! Client for a cover-generation service: validate an audio file, upload it
//! with a style prompt, poll the remote task and collect the generated tracks.
//!
//! [`app::GenerationController`] owns the lifecycle. Presentation code feeds
//! it inputs and listens for [`app::ControllerEvent`]s.

pub mod api;
pub mod app;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod settings;
pub mod task;
pub mod tracks;
pub mod validator;

pub use api::{ApiClient, GenerationApi, RawDetails, StartedTask};
pub use app::{ControllerEvent, GenerationController, Phase, PollOptions};
pub use config::Config;
pub use error::{ApiError, GenerationError, ValidationError};
pub use settings::GenerationSettings;
pub use task::{GenerationTask, Status, StatusReport};
pub use tracks::Track;
pub use validator::{validate, AudioFile};
