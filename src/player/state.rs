//! The three-state playback machine. Invalid transitions are no-ops, not
//! errors: asking a stopped player to pause simply does nothing.

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// `play(song)` is valid from every state.
    pub(crate) fn on_play(self) -> PlaybackState {
        PlaybackState::Playing
    }

    /// `pause` is only valid while playing.
    pub(crate) fn on_pause(self) -> Option<PlaybackState> {
        match self {
            PlaybackState::Playing => Some(PlaybackState::Paused),
            PlaybackState::Stopped | PlaybackState::Paused => None,
        }
    }

    /// `resume` is only valid while paused.
    pub(crate) fn on_resume(self) -> Option<PlaybackState> {
        match self {
            PlaybackState::Paused => Some(PlaybackState::Playing),
            PlaybackState::Stopped | PlaybackState::Playing => None,
        }
    }

    /// `stop` is valid from every state; stopping twice is a no-op.
    pub(crate) fn on_stop(self) -> Option<PlaybackState> {
        match self {
            PlaybackState::Stopped => None,
            PlaybackState::Playing | PlaybackState::Paused => Some(PlaybackState::Stopped),
        }
    }
}
