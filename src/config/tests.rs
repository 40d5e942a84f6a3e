use std::fs;

use tempfile::tempdir;

use super::*;
use crate::order::Mode;

#[test]
fn defaults_are_sane() {
    let settings = Settings::default();
    assert_eq!(settings.storage.page_size, 100);
    assert_eq!(settings.audio.volume, 40);
    assert!(settings.library.extensions.iter().any(|e| e == "flac"));
    assert!(settings.validate().is_ok());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let settings = Settings::load_from(Some(&dir.path().join("nope.toml"))).unwrap();
    assert_eq!(settings.storage.page_size, 100);
}

#[test]
fn file_values_override_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[storage]
page_size = 25

[audio]
volume = 80

[playback]
mode = "album-shuffle"

[library]
extensions = ["flac"]
include_hidden = true
"#,
    )
    .unwrap();

    let settings = Settings::load_from(Some(&path)).unwrap();
    assert_eq!(settings.storage.page_size, 25);
    assert_eq!(settings.audio.volume, 80);
    assert_eq!(Mode::from(settings.playback.mode), Mode::AlbumShuffle);
    assert_eq!(settings.library.extensions, vec!["flac".to_string()]);
    assert!(settings.library.include_hidden);
}

#[test]
fn validate_rejects_out_of_range_values() {
    let mut settings = Settings::default();
    settings.storage.page_size = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.audio.volume = 120;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.library.extensions.clear();
    assert!(settings.validate().is_err());
}

#[test]
fn mode_setting_aliases_parse() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[playback]\nmode = \"shuffle\"\n").unwrap();
    let settings = Settings::load_from(Some(&path)).unwrap();
    assert_eq!(Mode::from(settings.playback.mode), Mode::TrackShuffle);
}
