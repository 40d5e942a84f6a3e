//! Composition root: builds the store, engine and player, wires the MPRIS
//! surface, and drives everything from a line-oriented command loop.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::engine::{EngineEvent, RodioEngine, SeekTarget};
use crate::library::{self, AlbumId, SETTING_MODE, SETTING_VOLUME, Store};
use crate::mpris::{self, ControlCmd, MprisListener};
use crate::order::Mode;
use crate::pages::SongPages;
use crate::player::{LogScrobbler, PlaybackListener, PlaybackState, Player};

type AnyError = Box<dyn std::error::Error>;

pub fn run() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rondo=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load()?;
    settings.validate()?;

    let db_path = settings
        .database_path()
        .ok_or("could not determine a database path (is HOME set?)")?;
    let store = Store::open(&db_path)?;

    // A directory argument triggers a full rebuild; otherwise reuse the
    // previously scanned library.
    if let Some(dir) = std::env::args().nth(1) {
        let outcome = library::rescan(Path::new(&dir), &store, &settings.library)?;
        for error in &outcome.errors {
            tracing::warn!(error = %error, "file skipped during scan");
        }
        println!(
            "scanned {} songs ({} files skipped)",
            outcome.scanned,
            outcome.errors.len()
        );
    } else if store.count_songs()? == 0 {
        return Err("the library is empty; pass a music directory to scan".into());
    }

    // Persisted playback settings win over config defaults.
    let mode = store
        .get_setting(SETTING_MODE)?
        .as_deref()
        .and_then(Mode::parse)
        .unwrap_or_else(|| settings.playback.mode.into());
    let volume = store
        .get_setting(SETTING_VOLUME)?
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(settings.audio.volume)
        .min(100);

    // Engine init failure is the one fatal engine error.
    let (event_tx, event_rx) = mpsc::sync_channel::<EngineEvent>(64);
    let engine = RodioEngine::spawn(volume, event_tx)?;

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = mpris::spawn_mpris(control_tx);
    let listeners: Vec<Box<dyn PlaybackListener>> = vec![
        Box::new(MprisListener::new(mpris.clone())),
        Box::new(LogScrobbler),
    ];

    let player = Player::spawn(store.clone(), engine, event_rx, mode, volume, listeners);
    let mut pages = SongPages::new(store.clone(), settings.storage.page_size)?;

    let result = command_loop(&player, &mut pages, &control_rx);
    player.shutdown();
    result
}

fn command_loop(
    player: &Player,
    pages: &mut SongPages,
    control_rx: &Receiver<ControlCmd>,
) -> Result<(), AnyError> {
    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!(
        "rondo ready — play [index] | pause | resume | stop | next | prev | \
         seek <secs|pct%> | vol <0-100> | mode <sequential|track-shuffle|album-shuffle> | \
         album <artist> / <title> | list [page] | status | quit"
    );

    loop {
        // Media keys arrive through MPRIS and never block the loop.
        while let Ok(cmd) = control_rx.try_recv() {
            match cmd {
                ControlCmd::Quit => return Ok(()),
                ControlCmd::Play => match player.snapshot().state {
                    PlaybackState::Paused => player.resume(),
                    PlaybackState::Stopped => player.skip_forward(),
                    PlaybackState::Playing => {}
                },
                ControlCmd::Pause => player.pause(),
                ControlCmd::PlayPause => match player.snapshot().state {
                    PlaybackState::Playing => player.pause(),
                    PlaybackState::Paused => player.resume(),
                    PlaybackState::Stopped => player.skip_forward(),
                },
                ControlCmd::Stop => player.stop(),
                ControlCmd::Next => player.skip_forward(),
                ControlCmd::Prev => player.skip_backward(),
            }
        }

        match line_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => {
                if !handle_line(line.trim(), player, pages) {
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

/// Returns `false` when the loop should exit.
fn handle_line(line: &str, player: &Player, pages: &mut SongPages) -> bool {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    match cmd {
        "" => {}
        "quit" | "q" => return false,
        "play" if rest.is_empty() => match player.snapshot().state {
            PlaybackState::Paused => player.resume(),
            _ => player.skip_forward(),
        },
        "play" => match rest.parse::<u64>() {
            Ok(index) => match pages.get(index) {
                Ok(song) => player.play(song.clone()),
                Err(e) => println!("{e}"),
            },
            Err(_) => println!("usage: play [index]"),
        },
        "pause" => player.pause(),
        "resume" => player.resume(),
        "stop" => player.stop(),
        "next" => player.skip_forward(),
        "prev" => player.skip_backward(),
        "seek" => match parse_seek(rest) {
            Some(target) => player.seek(target),
            None => println!("usage: seek <secs|pct%>"),
        },
        "vol" => match rest.parse::<u8>() {
            Ok(volume) => player.set_volume(volume),
            Err(_) => println!("usage: vol <0-100>"),
        },
        "mode" => match Mode::parse(rest) {
            Some(mode) => player.set_mode(mode),
            None => println!("usage: mode <sequential|track-shuffle|album-shuffle>"),
        },
        "album" => match rest.split_once('/') {
            Some((artist, title)) => player.play_album(AlbumId {
                artist: artist.trim().to_string(),
                title: title.trim().to_string(),
            }),
            None => println!("usage: album <artist> / <title>"),
        },
        "list" => {
            let page = rest.parse::<u64>().unwrap_or(0);
            let page_size = u64::from(pages.page_size());
            let start = page * page_size;
            let end = (start + page_size).min(pages.len());
            if start >= pages.len() {
                println!("no such page");
            } else {
                for i in start..end {
                    match pages.get(i) {
                        Ok(song) => println!(
                            "{i:>6}  {} — {} — {}",
                            song.artist_name, song.album_title, song.title
                        ),
                        Err(e) => {
                            println!("{e}");
                            break;
                        }
                    }
                }
            }
        }
        "status" => {
            let snap = player.snapshot();
            match &snap.current {
                Some(song) => println!(
                    "{:?} [{}] {} — {} — {} ({}s / {}s, vol {})",
                    snap.state,
                    snap.mode.as_str(),
                    song.artist_name,
                    song.album_title,
                    song.title,
                    snap.elapsed.as_secs(),
                    song.duration.as_secs(),
                    snap.volume,
                ),
                None => println!(
                    "{:?} [{}] (nothing playing, vol {})",
                    snap.state,
                    snap.mode.as_str(),
                    snap.volume
                ),
            }
        }
        _ => println!("unknown command: {cmd}"),
    }
    true
}

fn parse_seek(arg: &str) -> Option<SeekTarget> {
    if let Some(pct) = arg.strip_suffix('%') {
        return pct.parse::<f64>().ok().map(SeekTarget::Percent);
    }
    arg.parse::<u64>()
        .ok()
        .map(|secs| SeekTarget::Absolute(Duration::from_secs(secs)))
}
