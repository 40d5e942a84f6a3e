//! Playback core: the domain actor that owns the media engine.
//!
//! `controller` holds the gapless queue logic and the state machine,
//! `handle` the actor thread and its public command surface, `listener`
//! the notification boundary for external collaborators.

mod controller;
mod handle;
mod listener;
mod state;
mod types;

pub use handle::Player;
pub use listener::{LogScrobbler, PlaybackListener};
pub use state::PlaybackState;
pub use types::{PlayerCmd, PlayerSnapshot};

#[cfg(test)]
mod tests;
