//! Media engine boundary types: commands, events and the snapshot the
//! domain actor reconciles against.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// How a loaded file joins the engine's internal play queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadMode {
    /// Drop the queue and play this file now.
    Replace,
    /// Add to the end of the queue without touching playback.
    Append,
    /// Add to the end of the queue; start playing it if the engine is idle.
    AppendPlay,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SeekTarget {
    Absolute(Duration),
    /// 0.0 ..= 100.0 of the current track.
    Percent(f64),
}

/// Why playback of the active queue slot ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The file played to its natural end.
    Eof,
    /// An explicit stop command.
    Stopped,
    /// The file could not be opened or decoded.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Elapsed(Duration),
    QueuePos(Option<usize>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PropertyChanged(Property),
    EndOfFile(EndReason),
    /// Terminal message: the engine thread is gone.
    Shutdown,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio engine initialization failed: {0}")]
    Init(String),
    #[error("audio engine is not running")]
    Disconnected,
}

/// Point-in-time view of the engine's queue. The engine only knows file
/// paths and slots; mapping back to songs is the caller's business.
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub queue: Vec<PathBuf>,
    pub pos: Option<usize>,
    pub elapsed: Duration,
    pub paused: bool,
}

impl EngineSnapshot {
    /// Path of the active queue slot, if any.
    pub fn current(&self) -> Option<&Path> {
        self.pos
            .and_then(|i| self.queue.get(i))
            .map(PathBuf::as_path)
    }
}

#[derive(Debug)]
pub(crate) enum EngineCmd {
    Load(PathBuf, LoadMode),
    QueueClear,
    Pause,
    Resume,
    Stop,
    Seek(SeekTarget),
    SetVolume(u8),
    Shutdown,
}

/// The queue controller's seam to the native engine. Commands are
/// fire-and-forget (failures surface on the event feed); `snapshot` is the
/// synchronous "which slot is active" query used for reconciliation.
pub trait MediaEngine: Send + 'static {
    fn load(&self, path: &Path, mode: LoadMode) -> Result<(), EngineError>;
    /// Clear every queue slot except the active one.
    fn queue_clear(&self) -> Result<(), EngineError>;
    fn pause(&self) -> Result<(), EngineError>;
    fn resume(&self) -> Result<(), EngineError>;
    fn stop(&self) -> Result<(), EngineError>;
    fn seek(&self, target: SeekTarget) -> Result<(), EngineError>;
    fn set_volume(&self, volume: u8) -> Result<(), EngineError>;
    fn snapshot(&self) -> EngineSnapshot;
    fn shutdown(&self);
}
