//! Notification boundary for external collaborators.
//!
//! The scrobbler and the OS media-center surface both hang off this trait;
//! the player invokes it from the actor thread, so implementations should
//! hand work off quickly.

use crate::library::Song;

use super::state::PlaybackState;

pub trait PlaybackListener: Send {
    /// A track became the active one (explicit play, skip, or a natural
    /// gapless transition).
    fn now_playing_changed(&self, _song: &Song) {}

    /// A track played to its natural end. Never fired for skipped tracks;
    /// this is the scrobble trigger.
    fn rendering_complete(&self, _song: &Song) {}

    fn state_changed(&self, _state: PlaybackState) {}
}

/// Stand-in for a listening-history service: records what a scrobbler
/// would submit. Network submission is a separate collaborator.
pub struct LogScrobbler;

impl PlaybackListener for LogScrobbler {
    fn now_playing_changed(&self, song: &Song) {
        tracing::info!(
            artist = %song.artist_name,
            title = %song.title,
            "now playing"
        );
    }

    fn rendering_complete(&self, song: &Song) {
        tracing::info!(
            artist = %song.artist_name,
            title = %song.title,
            "scrobble: track played to completion"
        );
    }
}
