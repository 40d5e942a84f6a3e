use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{EngineEvent, SeekTarget};
use crate::library::{AlbumId, Song};
use crate::order::Mode;

use super::state::PlaybackState;

/// Commands accepted by the player actor. All of them are fire-and-forget;
/// outcomes are observable through the snapshot and the listeners.
#[derive(Debug)]
pub enum PlayerCmd {
    Play(Song),
    PlayAlbum(AlbumId),
    Pause,
    Resume,
    Stop,
    SkipForward,
    SkipBackward,
    Seek(SeekTarget),
    SetVolume(u8),
    SetMode(Mode),
    Shutdown,
}

/// Everything the actor consumes, merged into one ordered stream: explicit
/// commands and the engine's event feed.
#[derive(Debug)]
pub(crate) enum PlayerMsg {
    Cmd(PlayerCmd),
    Engine(EngineEvent),
}

/// State snapshot shared with external collaborators (UI, MPRIS).
#[derive(Debug, Clone, Default)]
pub struct PlayerSnapshot {
    pub current: Option<Song>,
    pub state: PlaybackState,
    pub elapsed: Duration,
    pub mode: Mode,
    pub volume: u8,
}

pub(crate) type SnapshotHandle = Arc<Mutex<PlayerSnapshot>>;
