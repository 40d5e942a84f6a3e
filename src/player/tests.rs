use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::tempdir;

use crate::engine::{
    EndReason, EngineError, EngineEvent, EngineSnapshot, LoadMode, MediaEngine, SeekTarget,
};
use crate::library::{Directory, Song, Store};
use crate::order::{Mode, Resolver};

use super::controller::Controller;
use super::listener::PlaybackListener;
use super::state::PlaybackState;
use super::types::SnapshotHandle;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(PathBuf, LoadMode),
    QueueClear,
    Pause,
    Resume,
    Stop,
    Seek(SeekTarget),
    SetVolume(u8),
    Shutdown,
}

/// Scripted engine double: records every command and mimics the real
/// engine's queue bookkeeping so reconciliation can be driven from tests.
#[derive(Default)]
struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    state: Mutex<EngineSnapshot>,
}

impl FakeEngine {
    fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Simulate a natural gapless transition: the engine moved to the next
    /// queue slot on its own.
    fn advance(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.pos {
            if pos + 1 < state.queue.len() {
                state.pos = Some(pos + 1);
            }
        }
    }

    /// Simulate the queue running dry: nothing is active any more.
    fn run_dry(&self) {
        let mut state = self.state.lock().unwrap();
        state.queue.clear();
        state.pos = None;
    }
}

impl MediaEngine for FakeEngine {
    fn load(&self, path: &Path, mode: LoadMode) -> Result<(), EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Load(path.to_path_buf(), mode));
        let mut state = self.state.lock().unwrap();
        match mode {
            LoadMode::Replace => {
                state.queue = vec![path.to_path_buf()];
                state.pos = Some(0);
                state.paused = false;
            }
            LoadMode::Append => state.queue.push(path.to_path_buf()),
            LoadMode::AppendPlay => {
                state.queue.push(path.to_path_buf());
                if state.pos.is_none() {
                    state.pos = Some(state.queue.len() - 1);
                    state.paused = false;
                }
            }
        }
        Ok(())
    }

    fn queue_clear(&self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(Call::QueueClear);
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.pos {
            let current = state.queue[pos].clone();
            state.queue = vec![current];
            state.pos = Some(0);
        } else {
            state.queue.clear();
        }
        Ok(())
    }

    fn pause(&self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(Call::Pause);
        self.state.lock().unwrap().paused = true;
        Ok(())
    }

    fn resume(&self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(Call::Resume);
        self.state.lock().unwrap().paused = false;
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(Call::Stop);
        let mut state = self.state.lock().unwrap();
        state.queue.clear();
        state.pos = None;
        state.paused = true;
        Ok(())
    }

    fn seek(&self, target: SeekTarget) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(Call::Seek(target));
        Ok(())
    }

    fn set_volume(&self, volume: u8) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(Call::SetVolume(volume));
        Ok(())
    }

    fn snapshot(&self) -> EngineSnapshot {
        self.state.lock().unwrap().clone()
    }

    fn shutdown(&self) {
        self.calls.lock().unwrap().push(Call::Shutdown);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Note {
    NowPlaying(String),
    RenderingComplete(String),
    State(PlaybackState),
}

#[derive(Clone, Default)]
struct RecordingListener {
    notes: Arc<Mutex<Vec<Note>>>,
}

impl RecordingListener {
    fn take(&self) -> Vec<Note> {
        std::mem::take(&mut *self.notes.lock().unwrap())
    }
}

impl PlaybackListener for RecordingListener {
    fn now_playing_changed(&self, song: &Song) {
        self.notes
            .lock()
            .unwrap()
            .push(Note::NowPlaying(song.title.clone()));
    }

    fn rendering_complete(&self, song: &Song) {
        self.notes
            .lock()
            .unwrap()
            .push(Note::RenderingComplete(song.title.clone()));
    }

    fn state_changed(&self, state: PlaybackState) {
        self.notes.lock().unwrap().push(Note::State(state));
    }
}

fn song(artist: &str, album: &str, track: u32, path: &str) -> Song {
    Song {
        path: PathBuf::from(path),
        directory: PathBuf::from("/music"),
        title: format!("{album} {track}"),
        artist_name: artist.into(),
        album_title: album.into(),
        disc_number: 1,
        track_number: track,
        duration: Duration::from_secs(120),
        modified_stamp: 0,
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: Store,
    songs: Vec<Song>,
    listener: RecordingListener,
    controller: Controller<FakeEngine>,
}

/// Albums Alpha (2 tracks) and Beta (3 tracks) under one artist, driven by
/// a sequential resolver unless a test switches modes.
fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let store = Store::open(&dir.path().join("library.db")).unwrap();
    store
        .insert_directory(&Directory {
            path: PathBuf::from("/music"),
            modified_stamp: 0,
        })
        .unwrap();
    let songs = vec![
        song("Artist", "Alpha", 1, "/music/a1.flac"),
        song("Artist", "Alpha", 2, "/music/a2.flac"),
        song("Artist", "Beta", 1, "/music/b1.flac"),
        song("Artist", "Beta", 2, "/music/b2.flac"),
        song("Artist", "Beta", 3, "/music/b3.flac"),
    ];
    for s in &songs {
        store.insert_song(s).unwrap();
    }
    let listener = RecordingListener::default();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Default::default()));
    let controller = Controller::new(
        store.clone(),
        Resolver::new(store.clone(), Mode::Sequential),
        FakeEngine::default(),
        vec![Box::new(listener.clone())],
        snapshot,
        40,
    );
    Fixture {
        _dir: dir,
        store,
        songs,
        listener,
        controller,
    }
}

fn handle(fx: &mut Fixture, cmd: super::types::PlayerCmd) {
    assert!(fx.controller.handle_cmd(cmd));
}

use super::types::PlayerCmd;

#[test]
fn play_populates_lookahead_and_lookbehind_slots() {
    let mut fx = fixture();
    let __song = fx.songs[0].clone();
    handle(&mut fx, PlayerCmd::Play(__song));

    let calls = fx.controller.engine().take_calls();
    assert_eq!(
        calls,
        vec![
            Call::Load(PathBuf::from("/music/a1.flac"), LoadMode::Replace),
            Call::Resume,
            Call::QueueClear,
            // next(A1) = A2; previous(A1) wraps to B3.
            Call::Load(PathBuf::from("/music/a2.flac"), LoadMode::Append),
            Call::Load(PathBuf::from("/music/b3.flac"), LoadMode::Append),
        ]
    );
    assert_eq!(fx.controller.current(), Some(&fx.songs[0]));
    assert_eq!(fx.controller.state(), PlaybackState::Playing);
    assert_eq!(
        fx.listener.take(),
        vec![
            Note::NowPlaying("Alpha 1".into()),
            Note::State(PlaybackState::Playing),
        ]
    );
}

#[test]
fn natural_end_of_file_advances_without_a_command() {
    let mut fx = fixture();
    let __song = fx.songs[0].clone();
    handle(&mut fx, PlayerCmd::Play(__song));
    fx.controller.engine().take_calls();
    fx.listener.take();

    // The engine transitions to the preloaded look-ahead slot by itself.
    fx.controller.engine().advance();
    assert!(fx.controller.handle_event(EngineEvent::EndOfFile(EndReason::Eof)));

    assert_eq!(fx.controller.current(), Some(&fx.songs[1]));
    assert_eq!(fx.controller.state(), PlaybackState::Playing);
    let notes = fx.listener.take();
    assert_eq!(
        notes,
        vec![
            Note::RenderingComplete("Alpha 1".into()),
            Note::NowPlaying("Alpha 2".into()),
        ]
    );

    // The slots were recomputed around A2: next is B1, previous is A1.
    let calls = fx.controller.engine().take_calls();
    assert_eq!(
        calls,
        vec![
            Call::QueueClear,
            Call::Load(PathBuf::from("/music/b1.flac"), LoadMode::Append),
            Call::Load(PathBuf::from("/music/a1.flac"), LoadMode::Append),
        ]
    );
}

#[test]
fn stale_end_of_file_after_a_skip_is_discarded() {
    let mut fx = fixture();
    let __song = fx.songs[0].clone();
    handle(&mut fx, PlayerCmd::Play(__song));
    handle(&mut fx, PlayerCmd::SkipForward);
    assert_eq!(fx.controller.current(), Some(&fx.songs[1]));
    fx.controller.engine().take_calls();
    fx.listener.take();

    // An end-of-file raced with the skip and is delivered late. The
    // engine's active slot already matches the domain's current song.
    assert!(fx.controller.handle_event(EngineEvent::EndOfFile(EndReason::Eof)));

    assert_eq!(fx.controller.current(), Some(&fx.songs[1]));
    assert!(fx.listener.take().is_empty(), "no notification may fire");
    assert!(
        fx.controller.engine().take_calls().is_empty(),
        "the queue must not be touched"
    );
}

#[test]
fn end_of_file_with_a_dry_queue_stops_and_scrobbles() {
    let mut fx = fixture();
    let __song = fx.songs[4].clone();
    handle(&mut fx, PlayerCmd::Play(__song));
    fx.listener.take();

    fx.controller.engine().run_dry();
    assert!(fx.controller.handle_event(EngineEvent::EndOfFile(EndReason::Eof)));

    assert_eq!(fx.controller.current(), None);
    assert_eq!(fx.controller.state(), PlaybackState::Stopped);
    assert_eq!(
        fx.listener.take(),
        vec![
            Note::RenderingComplete("Beta 3".into()),
            Note::State(PlaybackState::Stopped),
        ]
    );
}

#[test]
fn skip_backward_with_nothing_playing_resolves_last() {
    let mut fx = fixture();
    handle(&mut fx, PlayerCmd::SkipBackward);
    assert_eq!(fx.controller.current(), Some(&fx.songs[4]));
}

#[test]
fn pause_and_resume_follow_the_state_machine() {
    let mut fx = fixture();

    // Pausing while stopped is a no-op, engine included.
    handle(&mut fx, PlayerCmd::Pause);
    assert!(fx.controller.engine().take_calls().is_empty());

    let __song = fx.songs[0].clone();
    handle(&mut fx, PlayerCmd::Play(__song));
    handle(&mut fx, PlayerCmd::Pause);
    assert_eq!(fx.controller.state(), PlaybackState::Paused);

    // Pausing twice does not reach the engine again.
    fx.controller.engine().take_calls();
    handle(&mut fx, PlayerCmd::Pause);
    assert!(fx.controller.engine().take_calls().is_empty());

    handle(&mut fx, PlayerCmd::Resume);
    assert_eq!(fx.controller.state(), PlaybackState::Playing);
}

#[test]
fn stop_clears_current_song_and_queue() {
    let mut fx = fixture();
    let __song = fx.songs[0].clone();
    handle(&mut fx, PlayerCmd::Play(__song));
    handle(&mut fx, PlayerCmd::Stop);

    assert_eq!(fx.controller.current(), None);
    assert_eq!(fx.controller.state(), PlaybackState::Stopped);
    assert!(fx.controller.engine().snapshot().queue.is_empty());

    // Stopping again is a no-op.
    fx.controller.engine().take_calls();
    handle(&mut fx, PlayerCmd::Stop);
    assert!(fx.controller.engine().take_calls().is_empty());
}

#[test]
fn empty_library_navigation_is_a_logged_noop() {
    let dir = tempdir().unwrap();
    let store = Store::open(&dir.path().join("library.db")).unwrap();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Default::default()));
    let mut controller = Controller::new(
        store.clone(),
        Resolver::new(store, Mode::Sequential),
        FakeEngine::default(),
        Vec::new(),
        snapshot,
        40,
    );

    assert!(controller.handle_cmd(PlayerCmd::SkipForward));
    assert_eq!(controller.current(), None);
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert!(controller.engine().take_calls().is_empty());
}

#[test]
fn set_mode_persists_and_recomputes_the_slots() {
    let mut fx = fixture();
    let __song = fx.songs[2].clone();
    handle(&mut fx, PlayerCmd::Play(__song));
    fx.controller.engine().take_calls();

    handle(&mut fx, PlayerCmd::SetMode(Mode::AlbumShuffle));

    assert_eq!(
        fx.store
            .get_setting(crate::library::SETTING_MODE)
            .unwrap()
            .as_deref(),
        Some("album-shuffle")
    );
    let calls = fx.controller.engine().take_calls();
    // Under album shuffle the look-ahead for B1 is B2 and the look-behind
    // falls back to the other album (Alpha's last track).
    assert_eq!(
        calls,
        vec![
            Call::QueueClear,
            Call::Load(PathBuf::from("/music/b2.flac"), LoadMode::Append),
            Call::Load(PathBuf::from("/music/a2.flac"), LoadMode::Append),
        ]
    );
}

#[test]
fn volume_is_clamped_and_persisted() {
    let mut fx = fixture();
    handle(&mut fx, PlayerCmd::SetVolume(255));

    assert_eq!(
        fx.controller.engine().take_calls(),
        vec![Call::SetVolume(100)]
    );
    assert_eq!(
        fx.store
            .get_setting(crate::library::SETTING_VOLUME)
            .unwrap()
            .as_deref(),
        Some("100")
    );
}

#[test]
fn seek_is_a_pass_through_without_queue_changes() {
    let mut fx = fixture();
    let __song = fx.songs[0].clone();
    handle(&mut fx, PlayerCmd::Play(__song));
    fx.controller.engine().take_calls();

    handle(
        &mut fx,
        PlayerCmd::Seek(SeekTarget::Absolute(Duration::from_secs(30))),
    );
    assert_eq!(
        fx.controller.engine().take_calls(),
        vec![Call::Seek(SeekTarget::Absolute(Duration::from_secs(30)))]
    );
}
