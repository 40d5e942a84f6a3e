use std::path::Path;
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::thread;
use super::types::{
    EngineCmd, EngineError, EngineEvent, EngineSnapshot, LoadMode, MediaEngine, SeekTarget,
};

const INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Owned handle to the rodio-backed engine thread.
///
/// Commands go over a channel to the thread; events come back on the
/// bounded channel handed to [`RodioEngine::spawn`]. Dropping the handle
/// without [`MediaEngine::shutdown`] leaves the thread running until its
/// command channel disconnects.
pub struct RodioEngine {
    tx: Sender<EngineCmd>,
    shared: Arc<Mutex<EngineSnapshot>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl RodioEngine {
    /// Spawn the engine thread. Fails if the default audio output device
    /// cannot be opened; that failure is fatal by design, unlike
    /// per-command failures which surface on the event feed.
    pub fn spawn(volume: u8, events: SyncSender<EngineEvent>) -> Result<Self, EngineError> {
        let (tx, rx) = mpsc::channel::<EngineCmd>();
        let shared = Arc::new(Mutex::new(EngineSnapshot::default()));
        let (ready_tx, ready_rx) = mpsc::channel();

        let shared_for_thread = shared.clone();
        let handle = std::thread::Builder::new()
            .name("rondo-engine".into())
            .spawn(move || thread::run(rx, events, shared_for_thread, volume, ready_tx))
            .map_err(|e| EngineError::Init(e.to_string()))?;

        match ready_rx.recv_timeout(INIT_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                tx,
                shared,
                join: Mutex::new(Some(handle)),
            }),
            Ok(Err(message)) => Err(EngineError::Init(message)),
            Err(_) => Err(EngineError::Init(
                "engine thread did not report readiness".into(),
            )),
        }
    }

    fn send(&self, cmd: EngineCmd) -> Result<(), EngineError> {
        self.tx.send(cmd).map_err(|_| EngineError::Disconnected)
    }
}

impl MediaEngine for RodioEngine {
    fn load(&self, path: &Path, mode: LoadMode) -> Result<(), EngineError> {
        self.send(EngineCmd::Load(path.to_path_buf(), mode))
    }

    fn queue_clear(&self) -> Result<(), EngineError> {
        self.send(EngineCmd::QueueClear)
    }

    fn pause(&self) -> Result<(), EngineError> {
        self.send(EngineCmd::Pause)
    }

    fn resume(&self) -> Result<(), EngineError> {
        self.send(EngineCmd::Resume)
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.send(EngineCmd::Stop)
    }

    fn seek(&self, target: SeekTarget) -> Result<(), EngineError> {
        self.send(EngineCmd::Seek(target))
    }

    fn set_volume(&self, volume: u8) -> Result<(), EngineError> {
        self.send(EngineCmd::SetVolume(volume))
    }

    fn snapshot(&self) -> EngineSnapshot {
        self.shared
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn shutdown(&self) {
        let _ = self.send(EngineCmd::Shutdown);
        if let Ok(mut join) = self.join.lock() {
            if let Some(handle) = join.take() {
                let _ = handle.join();
            }
        }
    }
}
