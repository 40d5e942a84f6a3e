use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Row;

/// A scanned song. `path` is the sole identity; everything else is tag data
/// captured at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub path: PathBuf,
    pub directory: PathBuf,
    pub title: String,
    pub artist_name: String,
    pub album_title: String,
    pub disc_number: u32,
    pub track_number: u32,
    pub duration: Duration,
    pub modified_stamp: i64,
}

impl Song {
    /// Decode a row selected with the store's song column list.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: PathBuf::from(row.get::<_, String>(0)?),
            directory: PathBuf::from(row.get::<_, String>(1)?),
            title: row.get(2)?,
            artist_name: row.get(3)?,
            album_title: row.get(4)?,
            disc_number: row.get(5)?,
            track_number: row.get(6)?,
            duration: Duration::from_secs(row.get::<_, i64>(7)?.max(0) as u64),
            modified_stamp: row.get(8)?,
        })
    }

    /// The canonical ordering key of this song.
    pub fn key(&self) -> SongKey {
        SongKey {
            artist: self.artist_name.clone(),
            album: self.album_title.clone(),
            disc: self.disc_number,
            track: self.track_number,
            path: self.path.clone(),
        }
    }

    pub fn album_id(&self) -> AlbumId {
        AlbumId {
            artist: self.artist_name.clone(),
            title: self.album_title.clone(),
        }
    }
}

/// The composite ordering key: (artist, album, disc, track, path).
///
/// Artist and album compare case-insensitively in the store; `path` is the
/// deterministic tie-break for songs that share the first four components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongKey {
    pub artist: String,
    pub album: String,
    pub disc: u32,
    pub track: u32,
    pub path: PathBuf,
}

/// Album identity: the (artist name, album title) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumId {
    pub artist: String,
    pub title: String,
}

/// A scanned library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub path: PathBuf,
    pub modified_stamp: i64,
}
