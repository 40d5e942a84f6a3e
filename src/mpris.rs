//! MPRIS D-Bus surface: exposes the player on the session bus and feeds
//! media-key commands back into the runtime.
//!
//! Commands travel over a plain channel (the runtime forwards them to the
//! player); state flows the other way through [`MprisListener`], which the
//! player invokes on its actor thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc::Sender};

use async_io::{Timer, block_on};
use zbus::{Connection, interface};
use zvariant::{OwnedValue, Value};

use crate::library::Song;
use crate::player::{PlaybackListener, PlaybackState};

#[derive(Clone, Debug)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
}

#[derive(Debug, Default)]
struct SharedState {
    playback: PlaybackState,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    length_micros: Option<i64>,
}

#[derive(Clone)]
pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
}

impl MprisHandle {
    pub fn set_playback(&self, playback: PlaybackState) {
        if let Ok(mut s) = self.state.lock() {
            s.playback = playback;
        }
    }

    pub fn set_song(&self, song: Option<&Song>) {
        if let Ok(mut s) = self.state.lock() {
            match song {
                Some(song) => {
                    s.title = Some(song.title.clone());
                    s.artist = Some(song.artist_name.clone());
                    s.album = Some(song.album_title.clone());
                    s.length_micros = Some(song.duration.as_micros() as i64);
                }
                None => {
                    s.title = None;
                    s.artist = None;
                    s.album = None;
                    s.length_micros = None;
                }
            }
        }
    }
}

/// Pushes player notifications into the shared MPRIS state.
pub struct MprisListener {
    handle: MprisHandle,
}

impl MprisListener {
    pub fn new(handle: MprisHandle) -> Self {
        Self { handle }
    }
}

impl PlaybackListener for MprisListener {
    fn now_playing_changed(&self, song: &Song) {
        self.handle.set_song(Some(song));
    }

    fn state_changed(&self, state: PlaybackState) {
        self.handle.set_playback(state);
        if state == PlaybackState::Stopped {
            self.handle.set_song(None);
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No-op for a headless player.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "rondo"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec![]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let mut put = |key: &str, value: Value<'_>| {
            if let Ok(owned) = OwnedValue::try_from(value) {
                map.insert(key.to_string(), owned);
            }
        };
        if let Some(title) = &s.title {
            put("xesam:title", Value::from(title.clone()));
        }
        if let Some(artist) = &s.artist {
            put("xesam:artist", Value::from(vec![artist.clone()]));
        }
        if let Some(album) = &s.album {
            put("xesam:album", Value::from(album.clone()));
        }
        if let Some(length) = s.length_micros {
            put("mpris:length", Value::from(length));
        }
        map
    }
}

/// Register the MPRIS interfaces on the session bus in a background
/// thread. D-Bus being unavailable is logged, never fatal.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));

    let state_for_thread = state.clone();
    std::thread::spawn(move || {
        block_on(async move {
            let path = "/org/mpris/MediaPlayer2";

            let connection = match Connection::session().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, "MPRIS: failed to connect to session bus");
                    return;
                }
            };

            if let Err(e) = connection.request_name("org.mpris.MediaPlayer2.rondo").await {
                tracing::warn!(error = %e, "MPRIS: failed to acquire bus name");
                return;
            }

            let object_server = connection.object_server();

            if let Err(e) = object_server.at(path, RootIface { tx: tx.clone() }).await {
                tracing::warn!(error = %e, "MPRIS: failed to register root interface");
                return;
            }

            if let Err(e) = object_server
                .at(
                    path,
                    PlayerIface {
                        tx,
                        state: state_for_thread,
                    },
                )
                .await
            {
                tracing::warn!(error = %e, "MPRIS: failed to register player interface");
                return;
            }

            // Keep the service alive.
            loop {
                Timer::after(std::time::Duration::from_secs(3600)).await;
            }
        });
    });

    MprisHandle { state }
}
