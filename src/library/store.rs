use std::path::{Path, PathBuf};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use r2d2_sqlite::rusqlite::OpenFlags;
use rusqlite::{OptionalExtension, params};
use thiserror::Error;

use super::model::{AlbumId, Directory, Song, SongKey};

/// Settings key for the persisted playback mode.
pub const SETTING_MODE: &str = "playback_mode";
/// Settings key for the persisted volume.
pub const SETTING_VOLUME: &str = "volume";

const SONG_COLUMNS: &str = "path, directory, title, artist_name, album_title, \
     disc_number, track_number, duration_secs, modified_stamp";

const ORDERING: &str = "artist_name COLLATE NOCASE, album_title COLLATE NOCASE, \
     disc_number, track_number, path";

const ORDERING_DESC: &str = "artist_name COLLATE NOCASE DESC, album_title COLLATE NOCASE DESC, \
     disc_number DESC, track_number DESC, path DESC";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
    #[error("could not create database directory: {0}")]
    Io(#[from] std::io::Error),
}

fn path_str(path: &Path) -> Result<&str, StoreError> {
    path.to_str()
        .ok_or_else(|| StoreError::NonUtf8Path(path.to_path_buf()))
}

/// Typed access to the SQLite library store.
///
/// Cheap to clone; all clones share one connection pool. Read queries are
/// synchronous indexed lookups over the canonical ordering key.
#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
}

impl Store {
    /// Open (and initialize, if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_NO_MUTEX
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_READ_WRITE,
            )
            .with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.execute_batch(include_str!("schema.sql"))
            });
        let pool = r2d2::Builder::new().min_idle(Some(1)).build(manager)?;
        Ok(Self { pool })
    }

    pub fn count_songs(&self) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM song", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    pub fn first_song(&self) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!("SELECT {SONG_COLUMNS} FROM song ORDER BY {ORDERING} LIMIT 1"),
            params![],
        )
    }

    pub fn last_song(&self) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!("SELECT {SONG_COLUMNS} FROM song ORDER BY {ORDERING_DESC} LIMIT 1"),
            params![],
        )
    }

    /// The strictly next song after `key` in canonical order.
    pub fn next_after(&self, key: &SongKey) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!(
                "SELECT {SONG_COLUMNS} FROM song \
                 WHERE (artist_name COLLATE NOCASE, album_title COLLATE NOCASE, \
                        disc_number, track_number, path) > (?1, ?2, ?3, ?4, ?5) \
                 ORDER BY {ORDERING} LIMIT 1"
            ),
            params![
                key.artist,
                key.album,
                key.disc,
                key.track,
                path_str(&key.path)?
            ],
        )
    }

    /// The strictly previous song before `key` in canonical order.
    pub fn previous_before(&self, key: &SongKey) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!(
                "SELECT {SONG_COLUMNS} FROM song \
                 WHERE (artist_name COLLATE NOCASE, album_title COLLATE NOCASE, \
                        disc_number, track_number, path) < (?1, ?2, ?3, ?4, ?5) \
                 ORDER BY {ORDERING_DESC} LIMIT 1"
            ),
            params![
                key.artist,
                key.album,
                key.disc,
                key.track,
                path_str(&key.path)?
            ],
        )
    }

    /// The next track of the same album, in (disc, track) order.
    pub fn album_next(&self, key: &SongKey) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!(
                "SELECT {SONG_COLUMNS} FROM song \
                 WHERE artist_name = ?1 AND album_title = ?2 \
                   AND (disc_number, track_number, path) > (?3, ?4, ?5) \
                 ORDER BY disc_number, track_number, path LIMIT 1"
            ),
            params![
                key.artist,
                key.album,
                key.disc,
                key.track,
                path_str(&key.path)?
            ],
        )
    }

    /// The previous track of the same album, in (disc, track) order.
    pub fn album_previous(&self, key: &SongKey) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!(
                "SELECT {SONG_COLUMNS} FROM song \
                 WHERE artist_name = ?1 AND album_title = ?2 \
                   AND (disc_number, track_number, path) < (?3, ?4, ?5) \
                 ORDER BY disc_number DESC, track_number DESC, path DESC LIMIT 1"
            ),
            params![
                key.artist,
                key.album,
                key.disc,
                key.track,
                path_str(&key.path)?
            ],
        )
    }

    /// A uniformly random song. Repeats across calls are possible.
    pub fn random_song(&self) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!("SELECT {SONG_COLUMNS} FROM song ORDER BY RANDOM() LIMIT 1"),
            params![],
        )
    }

    /// A random album, optionally excluding one. Returns `None` when every
    /// album is excluded (or the library is empty).
    pub fn random_album(&self, exclude: Option<&AlbumId>) -> Result<Option<AlbumId>, StoreError> {
        let conn = self.pool.get()?;
        let album = match exclude {
            Some(ex) => conn
                .query_row(
                    "SELECT artist, title FROM album \
                     WHERE NOT (artist = ?1 AND title = ?2) \
                     ORDER BY RANDOM() LIMIT 1",
                    params![ex.artist, ex.title],
                    |row| {
                        Ok(AlbumId {
                            artist: row.get(0)?,
                            title: row.get(1)?,
                        })
                    },
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT artist, title FROM album ORDER BY RANDOM() LIMIT 1",
                    [],
                    |row| {
                        Ok(AlbumId {
                            artist: row.get(0)?,
                            title: row.get(1)?,
                        })
                    },
                )
                .optional()?,
        };
        Ok(album)
    }

    /// First track of a random album. The exclusion is best-effort: a
    /// single-album library falls back to that album instead of looping.
    pub fn random_album_start(
        &self,
        exclude: Option<&AlbumId>,
    ) -> Result<Option<Song>, StoreError> {
        let album = match self.random_album(exclude)? {
            Some(album) => Some(album),
            None => self.random_album(None)?,
        };
        match album {
            Some(album) => self.first_of_album(&album),
            None => Ok(None),
        }
    }

    pub fn first_of_album(&self, album: &AlbumId) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!(
                "SELECT {SONG_COLUMNS} FROM song \
                 WHERE artist_name = ?1 AND album_title = ?2 \
                 ORDER BY disc_number, track_number, path LIMIT 1"
            ),
            params![album.artist, album.title],
        )
    }

    pub fn last_of_album(&self, album: &AlbumId) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!(
                "SELECT {SONG_COLUMNS} FROM song \
                 WHERE artist_name = ?1 AND album_title = ?2 \
                 ORDER BY disc_number DESC, track_number DESC, path DESC LIMIT 1"
            ),
            params![album.artist, album.title],
        )
    }

    pub fn songs_of_album(&self, album: &AlbumId) -> Result<Vec<Song>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SONG_COLUMNS} FROM song \
             WHERE artist_name = ?1 AND album_title = ?2 \
             ORDER BY disc_number, track_number, path"
        ))?;
        let rows = stmt.query_map(params![album.artist, album.title], Song::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Exact-key lookup; used to map an engine queue slot back to a song.
    pub fn song_by_path(&self, path: &Path) -> Result<Option<Song>, StoreError> {
        self.one(
            &format!("SELECT {SONG_COLUMNS} FROM song WHERE path = ?1"),
            params![path_str(path)?],
        )
    }

    /// Ordering keys of rows 1, P+1, 2P+1, … — one ranked query.
    pub fn page_anchors(&self, page_size: u32) -> Result<Vec<SongKey>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT artist_name, album_title, disc_number, track_number, path FROM ( \
                 SELECT artist_name, album_title, disc_number, track_number, path, \
                        ROW_NUMBER() OVER (ORDER BY {ORDERING}) AS rn \
                 FROM song) \
             WHERE (rn - 1) % ?1 = 0 ORDER BY rn"
        ))?;
        let rows = stmt.query_map(params![page_size], |row| {
            Ok(SongKey {
                artist: row.get(0)?,
                album: row.get(1)?,
                disc: row.get(2)?,
                track: row.get(3)?,
                path: PathBuf::from(row.get::<_, String>(4)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Keyset page fetch: up to `limit` songs with ordering key >= `anchor`.
    pub fn page_at(&self, anchor: &SongKey, limit: u32) -> Result<Vec<Song>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SONG_COLUMNS} FROM song \
             WHERE (artist_name COLLATE NOCASE, album_title COLLATE NOCASE, \
                    disc_number, track_number, path) >= (?1, ?2, ?3, ?4, ?5) \
             ORDER BY {ORDERING} LIMIT ?6"
        ))?;
        let rows = stmt.query_map(
            params![
                anchor.artist,
                anchor.album,
                anchor.disc,
                anchor.track,
                path_str(&anchor.path)?,
                limit
            ],
            Song::from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.pool.get()?;
        Ok(conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub(crate) fn insert_directory(&self, dir: &Directory) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO directory (path, modified_stamp) VALUES (?1, ?2)",
            params![path_str(&dir.path)?, dir.modified_stamp],
        )?;
        Ok(())
    }

    /// Insert one song plus its artist/album rows, atomically. Re-inserting
    /// the same path overwrites; it never duplicates.
    pub(crate) fn insert_song(&self, song: &Song) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.prepare_cached("INSERT OR IGNORE INTO artist (name) VALUES (?1)")?
            .execute(params![song.artist_name])?;
        tx.prepare_cached("INSERT OR IGNORE INTO album (title, artist) VALUES (?1, ?2)")?
            .execute(params![song.album_title, song.artist_name])?;
        tx.prepare_cached(&format!(
            "INSERT OR REPLACE INTO song ({SONG_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ))?
        .execute(params![
            path_str(&song.path)?,
            path_str(&song.directory)?,
            song.title,
            song.artist_name,
            song.album_title,
            song.disc_number,
            song.track_number,
            song.duration.as_secs() as i64,
            song.modified_stamp,
        ])?;
        tx.commit()?;
        Ok(())
    }

    /// Drop all scanned data (settings survive). A rescan always rebuilds
    /// from scratch.
    pub(crate) fn clear_all(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "DELETE FROM song; \
             DELETE FROM album; \
             DELETE FROM artist; \
             DELETE FROM directory;",
        )?;
        Ok(())
    }

    fn one(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Option<Song>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(sql)?;
        Ok(stmt.query_row(args, Song::from_row).optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    pub(crate) fn open_store(dir: &Path) -> Store {
        let store = Store::open(&dir.join("library.db")).unwrap();
        store
            .insert_directory(&Directory {
                path: PathBuf::from("/music"),
                modified_stamp: 0,
            })
            .unwrap();
        store
    }

    pub(crate) fn song(artist: &str, album: &str, disc: u32, track: u32, path: &str) -> Song {
        Song {
            path: PathBuf::from(path),
            directory: PathBuf::from("/music"),
            title: format!("track {track}"),
            artist_name: artist.into(),
            album_title: album.into(),
            disc_number: disc,
            track_number: track,
            duration: Duration::from_secs(180),
            modified_stamp: 0,
        }
    }

    #[test]
    fn ordering_is_case_insensitive_on_artist_and_album() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.insert_song(&song("beta", "Z", 1, 1, "/music/b.flac")).unwrap();
        store.insert_song(&song("Alpha", "a", 1, 1, "/music/a.flac")).unwrap();

        let first = store.first_song().unwrap().unwrap();
        assert_eq!(first.artist_name, "Alpha");
        let last = store.last_song().unwrap().unwrap();
        assert_eq!(last.artist_name, "beta");
    }

    #[test]
    fn next_and_previous_are_strict_neighbors() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let a = song("Art", "Alb", 1, 1, "/music/1.flac");
        let b = song("Art", "Alb", 1, 2, "/music/2.flac");
        store.insert_song(&a).unwrap();
        store.insert_song(&b).unwrap();

        assert_eq!(store.next_after(&a.key()).unwrap().unwrap(), b);
        assert_eq!(store.previous_before(&b.key()).unwrap().unwrap(), a);
        assert!(store.next_after(&b.key()).unwrap().is_none());
        assert!(store.previous_before(&a.key()).unwrap().is_none());
    }

    #[test]
    fn identical_tag_tuples_order_by_path() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let dup1 = song("Art", "Alb", 1, 1, "/music/copy-a.flac");
        let dup2 = song("Art", "Alb", 1, 1, "/music/copy-b.flac");
        store.insert_song(&dup2).unwrap();
        store.insert_song(&dup1).unwrap();

        assert_eq!(store.first_song().unwrap().unwrap(), dup1);
        assert_eq!(store.next_after(&dup1.key()).unwrap().unwrap(), dup2);
        assert_eq!(store.previous_before(&dup2.key()).unwrap().unwrap(), dup1);
    }

    #[test]
    fn reinserting_a_path_overwrites_instead_of_duplicating() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.insert_song(&song("Old", "Alb", 1, 1, "/music/x.flac")).unwrap();
        store.insert_song(&song("New", "Alb", 1, 1, "/music/x.flac")).unwrap();

        assert_eq!(store.count_songs().unwrap(), 1);
        let got = store.song_by_path(Path::new("/music/x.flac")).unwrap().unwrap();
        assert_eq!(got.artist_name, "New");
    }

    #[test]
    fn random_album_exclusion_avoids_the_current_album() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.insert_song(&song("Art", "One", 1, 1, "/music/one.flac")).unwrap();
        store.insert_song(&song("Art", "Two", 1, 1, "/music/two.flac")).unwrap();

        let exclude = AlbumId { artist: "Art".into(), title: "One".into() };
        for _ in 0..10 {
            let album = store.random_album(Some(&exclude)).unwrap().unwrap();
            assert_eq!(album.title, "Two");
        }
    }

    #[test]
    fn random_album_start_falls_back_for_single_album_libraries() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.insert_song(&song("Art", "Only", 1, 2, "/music/2.flac")).unwrap();
        store.insert_song(&song("Art", "Only", 1, 1, "/music/1.flac")).unwrap();

        let exclude = AlbumId { artist: "Art".into(), title: "Only".into() };
        let start = store.random_album_start(Some(&exclude)).unwrap().unwrap();
        assert_eq!(start.track_number, 1);
        assert_eq!(start.album_title, "Only");
    }

    #[test]
    fn songs_of_album_follow_disc_then_track_order() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.insert_song(&song("Art", "Alb", 2, 1, "/music/d2t1.flac")).unwrap();
        store.insert_song(&song("Art", "Alb", 1, 2, "/music/d1t2.flac")).unwrap();
        store.insert_song(&song("Art", "Alb", 1, 1, "/music/d1t1.flac")).unwrap();
        store.insert_song(&song("Art", "Other", 1, 1, "/music/other.flac")).unwrap();

        let album = AlbumId { artist: "Art".into(), title: "Alb".into() };
        let tracks = store.songs_of_album(&album).unwrap();
        let order: Vec<(u32, u32)> = tracks
            .iter()
            .map(|s| (s.disc_number, s.track_number))
            .collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn settings_survive_a_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path());
            store.set_setting(SETTING_MODE, "album-shuffle").unwrap();
            store.set_setting(SETTING_MODE, "track-shuffle").unwrap();
        }
        let store = open_store(dir.path());
        assert_eq!(
            store.get_setting(SETTING_MODE).unwrap().as_deref(),
            Some("track-shuffle")
        );
    }

    #[test]
    fn clear_all_rebuild_leaves_settings_intact() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.insert_song(&song("Art", "Alb", 1, 1, "/music/1.flac")).unwrap();
        store.set_setting(SETTING_VOLUME, "55").unwrap();

        store.clear_all().unwrap();
        assert_eq!(store.count_songs().unwrap(), 0);
        assert_eq!(store.get_setting(SETTING_VOLUME).unwrap().as_deref(), Some("55"));
    }
}
