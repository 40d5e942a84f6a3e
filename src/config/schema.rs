use std::path::PathBuf;

use serde::Deserialize;

use crate::order::Mode;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/rondo/config.toml` or
/// `~/.config/rondo/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `RONDO__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub audio: AudioSettings,
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Library database location. Defaults to
    /// `$XDG_DATA_HOME/rondo/library.db`.
    pub database_path: Option<PathBuf>,
    /// Page size of the lazy pagination buffer.
    pub page_size: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Initial volume (0..=100) when none has been persisted yet.
    pub volume: u8,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { volume: 40 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Playback mode used when none has been persisted yet.
    pub mode: ModeSetting,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            mode: ModeSetting::Sequential,
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeSetting {
    Sequential,
    #[serde(alias = "shuffle", alias = "track_shuffle")]
    TrackShuffle,
    #[serde(alias = "album_shuffle")]
    AlbumShuffle,
}

impl From<ModeSetting> for Mode {
    fn from(setting: ModeSetting) -> Self {
        match setting {
            ModeSetting::Sequential => Mode::Sequential,
            ModeSetting::TrackShuffle => Mode::TrackShuffle,
            ModeSetting::AlbumShuffle => Mode::AlbumShuffle,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec![
                "mp3".into(),
                "flac".into(),
                "wav".into(),
                "ogg".into(),
                "m4a".into(),
                "opus".into(),
            ],
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
        }
    }
}
