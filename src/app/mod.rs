mod controller;
mod polling;
mod state;

pub use controller::GenerationController;
pub use polling::NO_TRACKS_MESSAGE;
pub use state::{ControllerEvent, Phase, PollOptions};
