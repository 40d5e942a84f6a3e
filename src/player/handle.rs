use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::engine::{EngineEvent, MediaEngine, SeekTarget};
use crate::library::{AlbumId, Song, Store};
use crate::order::{Mode, Resolver};

use super::controller::Controller;
use super::listener::PlaybackListener;
use super::types::{PlayerCmd, PlayerMsg, PlayerSnapshot, SnapshotHandle};

/// Handle to the player actor thread.
///
/// Commands from any thread funnel into one channel; the engine's event
/// pump feeds the same channel, so the actor is the single writer of all
/// playback state.
pub struct Player {
    tx: Sender<PlayerMsg>,
    snapshot: SnapshotHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Player {
    /// Spawn the actor and the engine event pump.
    ///
    /// `engine_events` is the receiving side of the bounded channel handed
    /// to the engine at construction; `mode` and `volume` are the persisted
    /// values loaded by the composition root.
    pub fn spawn<E: MediaEngine>(
        store: Store,
        engine: E,
        engine_events: Receiver<EngineEvent>,
        mode: Mode,
        volume: u8,
        listeners: Vec<Box<dyn PlaybackListener>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<PlayerMsg>();
        let snapshot: SnapshotHandle = Arc::new(Mutex::new(PlayerSnapshot::default()));

        // Event pump: the only bridge from the engine's execution context
        // into the actor's ordered stream. Ends on the terminal message.
        let pump_tx = tx.clone();
        thread::spawn(move || {
            for event in engine_events.iter() {
                let last = matches!(event, EngineEvent::Shutdown);
                if pump_tx.send(PlayerMsg::Engine(event)).is_err() || last {
                    break;
                }
            }
        });

        let actor_snapshot = snapshot.clone();
        let join = thread::spawn(move || {
            let resolver = Resolver::new(store.clone(), mode);
            let mut controller =
                Controller::new(store, resolver, engine, listeners, actor_snapshot, volume);
            for msg in rx.iter() {
                let proceed = match msg {
                    PlayerMsg::Cmd(cmd) => controller.handle_cmd(cmd),
                    PlayerMsg::Engine(event) => controller.handle_event(event),
                };
                if !proceed {
                    break;
                }
            }
            tracing::debug!("player actor exiting");
        });

        Self {
            tx,
            snapshot,
            join: Mutex::new(Some(join)),
        }
    }

    pub fn play(&self, song: Song) {
        self.send(PlayerCmd::Play(song));
    }

    pub fn play_album(&self, album: AlbumId) {
        self.send(PlayerCmd::PlayAlbum(album));
    }

    pub fn pause(&self) {
        self.send(PlayerCmd::Pause);
    }

    pub fn resume(&self) {
        self.send(PlayerCmd::Resume);
    }

    pub fn stop(&self) {
        self.send(PlayerCmd::Stop);
    }

    pub fn skip_forward(&self) {
        self.send(PlayerCmd::SkipForward);
    }

    pub fn skip_backward(&self) {
        self.send(PlayerCmd::SkipBackward);
    }

    pub fn seek(&self, target: SeekTarget) {
        self.send(PlayerCmd::Seek(target));
    }

    pub fn set_volume(&self, volume: u8) {
        self.send(PlayerCmd::SetVolume(volume));
    }

    pub fn set_mode(&self, mode: Mode) {
        self.send(PlayerCmd::SetMode(mode));
    }

    /// Current state snapshot for UIs and collaborators.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Stop the engine and wait for the actor to drain.
    pub fn shutdown(&self) {
        self.send(PlayerCmd::Shutdown);
        if let Ok(mut join) = self.join.lock() {
            if let Some(handle) = join.take() {
                let _ = handle.join();
            }
        }
    }

    fn send(&self, cmd: PlayerCmd) {
        if self.tx.send(PlayerMsg::Cmd(cmd)).is_err() {
            tracing::warn!("player actor is gone; command dropped");
        }
    }
}
