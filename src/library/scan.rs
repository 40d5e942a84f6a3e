use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::ItemKey;
use rayon::iter::{Either, ParallelBridge, ParallelIterator};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::model::{Directory, Song};
use super::store::{Store, StoreError};

const UNKNOWN: &str = "UNKNOWN";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Metadata(#[from] lofty::error::LoftyError),
    #[error(transparent)]
    File(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] StoreError),
}

/// Result of a directory scan: how many files made it into the store, and
/// the per-file failures that did not abort the rest of the walk.
#[derive(Debug)]
pub struct ScanOutcome {
    pub scanned: usize,
    pub errors: Vec<ScanError>,
}

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn modified_stamp(path: &Path) -> Result<i64, std::io::Error> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64)
}

/// Scan `root` for audio files and insert them into `store`.
///
/// The directory row itself is all-or-nothing; individual file failures are
/// collected into [`ScanOutcome::errors`] and never abort the walk. Files
/// are processed on the rayon worker pool.
pub fn scan(root: &Path, store: &Store, settings: &LibrarySettings) -> Result<ScanOutcome, ScanError> {
    let root = std::path::absolute(root)?;
    store.insert_directory(&Directory {
        path: root.clone(),
        modified_stamp: modified_stamp(&root)?,
    })?;

    let mut walker = WalkDir::new(&root).follow_links(settings.follow_links);
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    let (oks, errors): (Vec<()>, Vec<ScanError>) = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|entry| {
            let path = entry.path();
            path.is_file()
                && (settings.include_hidden || !is_hidden(path))
                && is_audio_file(path, settings)
        })
        .par_bridge()
        .partition_map(|entry| match scan_file(entry.path(), &root, store) {
            Ok(()) => Either::Left(()),
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "skipping file");
                Either::Right(e)
            }
        });

    tracing::info!(
        root = %root.display(),
        scanned = oks.len(),
        failed = errors.len(),
        "library scan finished"
    );
    Ok(ScanOutcome {
        scanned: oks.len(),
        errors,
    })
}

/// Clear the store and rebuild it from `root`. There is no incremental
/// diffing; a rescan always starts from an empty library.
pub fn rescan(
    root: &Path,
    store: &Store,
    settings: &LibrarySettings,
) -> Result<ScanOutcome, ScanError> {
    store.clear_all()?;
    scan(root, store, settings)
}

fn scan_file(path: &Path, root: &Path, store: &Store) -> Result<(), ScanError> {
    let path = std::path::absolute(path)?;
    let tagged = lofty::read_from_path(&path)?;
    let duration = tagged.properties().duration();

    let default_title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(UNKNOWN)
        .to_string();

    let mut title = default_title;
    let mut track_artist: Option<String> = None;
    let mut album_artist: Option<String> = None;
    let mut album: Option<String> = None;
    let mut disc_number = 1;
    let mut track_number = 1;

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        if let Some(v) = tag.get_string(&ItemKey::TrackTitle) {
            if !v.trim().is_empty() {
                title = v.to_string();
            }
        }
        track_artist = tag
            .get_string(&ItemKey::TrackArtist)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        album_artist = tag
            .get_string(&ItemKey::AlbumArtist)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        album = tag
            .get_string(&ItemKey::AlbumTitle)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        if let Some(n) = tag.get_string(&ItemKey::DiscNumber).and_then(leading_number) {
            disc_number = n;
        }
        if let Some(n) = tag.get_string(&ItemKey::TrackNumber).and_then(leading_number) {
            track_number = n;
        }
    }

    // The album artist, when present, is the grouping identity; per-track
    // artists would otherwise split one album across several.
    let artist_name = album_artist
        .or(track_artist)
        .unwrap_or_else(|| UNKNOWN.to_string());

    store.insert_song(&Song {
        modified_stamp: modified_stamp(&path)?,
        path,
        directory: root.to_path_buf(),
        title,
        artist_name,
        album_title: album.unwrap_or_else(|| UNKNOWN.to_string()),
        disc_number,
        track_number,
        duration,
    })?;
    Ok(())
}

/// Parse the leading digits of a tag value ("3/12" -> 3).
fn leading_number(value: &str) -> Option<u32> {
    let mut digits = value.trim().chars().map_while(|c| c.to_digit(10));
    let first = digits.next()?;
    Some(digits.fold(first, |acc, d| acc.saturating_mul(10).saturating_add(d)))
}
