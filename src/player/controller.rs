use std::path::Path;
use std::time::Duration;

use crate::engine::{EndReason, EngineEvent, LoadMode, MediaEngine, Property};
use crate::library::{AlbumId, SETTING_MODE, SETTING_VOLUME, Song, Store};
use crate::order::{Mode, ResolveError, Resolver};

use super::listener::PlaybackListener;
use super::state::PlaybackState;
use super::types::{PlayerCmd, SnapshotHandle};

/// The gapless queue controller: owns the engine handle and keeps its play
/// queue populated with the current track plus one look-ahead and one
/// look-behind slot.
///
/// All methods run on the single actor thread; nothing else mutates
/// playback state.
pub(crate) struct Controller<E: MediaEngine> {
    store: Store,
    resolver: Resolver,
    engine: E,
    listeners: Vec<Box<dyn PlaybackListener>>,
    snapshot: SnapshotHandle,
    current: Option<Song>,
    state: PlaybackState,
    volume: u8,
}

impl<E: MediaEngine> Controller<E> {
    pub(crate) fn new(
        store: Store,
        resolver: Resolver,
        engine: E,
        listeners: Vec<Box<dyn PlaybackListener>>,
        snapshot: SnapshotHandle,
        volume: u8,
    ) -> Self {
        let controller = Self {
            store,
            resolver,
            engine,
            listeners,
            snapshot,
            current: None,
            state: PlaybackState::Stopped,
            volume: volume.min(100),
        };
        controller.publish();
        controller
    }

    /// Process one command. Returns `false` when the actor should exit.
    pub(crate) fn handle_cmd(&mut self, cmd: PlayerCmd) -> bool {
        match cmd {
            PlayerCmd::Play(song) => self.play(song),
            PlayerCmd::PlayAlbum(album) => self.play_album(&album),
            PlayerCmd::Pause => {
                if let Some(next) = self.state.on_pause() {
                    self.engine_call(self.engine.pause()).ok();
                    self.set_state(next);
                }
            }
            PlayerCmd::Resume => {
                if let Some(next) = self.state.on_resume() {
                    self.engine_call(self.engine.resume()).ok();
                    self.set_state(next);
                }
            }
            PlayerCmd::Stop => {
                if let Some(next) = self.state.on_stop() {
                    self.engine_call(self.engine.stop()).ok();
                    self.set_current(None);
                    self.set_state(next);
                }
            }
            PlayerCmd::SkipForward => self.skip(true),
            PlayerCmd::SkipBackward => self.skip(false),
            PlayerCmd::Seek(target) => {
                self.engine_call(self.engine.seek(target)).ok();
            }
            PlayerCmd::SetVolume(volume) => {
                self.volume = volume.min(100);
                self.engine_call(self.engine.set_volume(self.volume)).ok();
                self.persist(SETTING_VOLUME, &self.volume.to_string());
                self.publish();
            }
            PlayerCmd::SetMode(mode) => self.set_mode(mode),
            PlayerCmd::Shutdown => {
                self.engine.shutdown();
                return false;
            }
        }
        true
    }

    /// Process one engine event. Returns `false` when the actor should
    /// exit (engine shutdown is the terminal message).
    pub(crate) fn handle_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::PropertyChanged(Property::Elapsed(elapsed)) => {
                if let Ok(mut snap) = self.snapshot.lock() {
                    snap.elapsed = elapsed;
                }
            }
            // The queue position is re-queried on demand during
            // reconciliation; the property feed is advisory.
            EngineEvent::PropertyChanged(Property::QueuePos(pos)) => {
                tracing::debug!(?pos, "engine queue position changed");
            }
            EngineEvent::EndOfFile(EndReason::Eof) => self.reconcile_end_of_file(),
            EngineEvent::EndOfFile(reason) => {
                tracing::debug!(?reason, "ignoring non-eof end-of-file event");
            }
            EngineEvent::Shutdown => return false,
        }
        true
    }

    /// Load `song` as the active engine slot and rebuild the look-ahead
    /// and look-behind slots around it.
    fn play(&mut self, song: Song) {
        if self
            .engine_call(self.engine.load(&song.path, LoadMode::Replace))
            .is_err()
        {
            return;
        }
        self.engine_call(self.engine.resume()).ok();
        self.requeue_neighbors(&song);
        self.set_current(Some(song));
        self.set_state(self.state.on_play());
    }

    fn play_album(&mut self, album: &AlbumId) {
        match self.store.first_of_album(album) {
            Ok(Some(song)) => self.play(song),
            Ok(None) => tracing::warn!(?album, "album has no tracks"),
            Err(e) => tracing::error!(error = %e, "album lookup failed"),
        }
    }

    /// Explicit skip: resolve relative to the current song, then behave
    /// exactly like `play`. Always wins a race against an in-flight
    /// end-of-file reconciliation (see `reconcile_end_of_file`).
    fn skip(&mut self, forward: bool) {
        let resolved = match &self.current {
            Some(current) => {
                let key = current.key();
                if forward {
                    self.resolver.next(&key)
                } else {
                    self.resolver.previous(&key)
                }
            }
            None if forward => self.resolver.first(),
            None => self.resolver.last(),
        };
        match resolved {
            Ok(song) => self.play(song),
            Err(ResolveError::EmptyLibrary) => {
                tracing::warn!("skip ignored: the library is empty");
            }
            Err(e) => tracing::error!(error = %e, "skip failed"),
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        self.resolver.set_mode(mode);
        self.persist(SETTING_MODE, mode.as_str());
        // The look-ahead/look-behind slots were resolved under the old
        // mode; recompute them for the current song.
        if let Some(current) = self.current.clone() {
            self.requeue_neighbors(&current);
        }
        self.publish();
    }

    /// The engine finished a file naturally. Map its now-active queue slot
    /// back to a song, suppress stale events, and repopulate the slots.
    fn reconcile_end_of_file(&mut self) {
        let snapshot = self.engine.snapshot();
        let Some(engine_path) = snapshot.current().map(Path::to_path_buf) else {
            // The queue ran dry (no look-ahead existed). The last song
            // still completed naturally.
            if let Some(done) = self.current.take() {
                self.notify_rendering_complete(&done);
            }
            self.publish();
            if let Some(next) = self.state.on_stop() {
                self.set_state(next);
            }
            return;
        };

        if self
            .current
            .as_ref()
            .is_some_and(|song| song.path == engine_path)
        {
            // An explicit command already advanced the domain past this
            // event; applying it would desynchronize us from the engine.
            tracing::debug!("discarding stale end-of-file event");
            return;
        }

        match self.store.song_by_path(&engine_path) {
            Ok(Some(song)) => {
                if let Some(done) = self.current.clone() {
                    self.notify_rendering_complete(&done);
                }
                self.requeue_neighbors(&song);
                self.set_current(Some(song));
                self.set_state(self.state.on_play());
            }
            Ok(None) => {
                tracing::warn!(path = %engine_path.display(), "active engine slot is not in the library");
            }
            Err(e) => tracing::error!(error = %e, "end-of-file reconciliation failed"),
        }
    }

    /// Clear every queued slot except the active one, then append the
    /// resolved next and previous songs.
    fn requeue_neighbors(&mut self, song: &Song) {
        self.engine_call(self.engine.queue_clear()).ok();
        let key = song.key();
        match self.resolver.next(&key) {
            Ok(next) => {
                self.engine_call(self.engine.load(&next.path, LoadMode::Append)).ok();
            }
            Err(ResolveError::EmptyLibrary) => {}
            Err(e) => tracing::error!(error = %e, "look-ahead resolution failed"),
        }
        match self.resolver.previous(&key) {
            Ok(previous) => {
                self.engine_call(self.engine.load(&previous.path, LoadMode::Append)).ok();
            }
            Err(ResolveError::EmptyLibrary) => {}
            Err(e) => tracing::error!(error = %e, "look-behind resolution failed"),
        }
    }

    fn set_current(&mut self, song: Option<Song>) {
        self.current = song;
        if let Ok(mut snap) = self.snapshot.lock() {
            snap.current = self.current.clone();
            snap.elapsed = Duration::ZERO;
        }
        if let Some(song) = &self.current {
            for listener in &self.listeners {
                listener.now_playing_changed(song);
            }
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.publish();
        for listener in &self.listeners {
            listener.state_changed(state);
        }
    }

    fn notify_rendering_complete(&self, song: &Song) {
        for listener in &self.listeners {
            listener.rendering_complete(song);
        }
    }

    fn publish(&self) {
        if let Ok(mut snap) = self.snapshot.lock() {
            snap.current = self.current.clone();
            snap.state = self.state;
            snap.mode = self.resolver.mode();
            snap.volume = self.volume;
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set_setting(key, value) {
            tracing::warn!(key, error = %e, "could not persist setting");
        }
    }

    /// Per-command engine failures are reported and survived, never fatal.
    fn engine_call(
        &self,
        result: Result<(), crate::engine::EngineError>,
    ) -> Result<(), crate::engine::EngineError> {
        if let Err(e) = &result {
            tracing::error!(error = %e, "engine command failed");
        }
        result
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> PlaybackState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }
}
