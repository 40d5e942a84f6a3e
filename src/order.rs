//! Order resolver: maps (playback mode, current ordering key) to the song
//! that plays next or previously.
//!
//! Collection boundaries are never errors here. Sequential mode wraps
//! around; album shuffle falls back to a fresh random album. The only
//! failure is asking an empty library for a song.

use thiserror::Error;

use crate::library::{AlbumId, Song, SongKey, Store, StoreError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Walk the whole collection in canonical order, wrapping at the ends.
    Sequential,
    /// An independent uniform draw on every call. This is not a shuffle
    /// bag: repeats are possible.
    TrackShuffle,
    /// Play albums front to back, hopping to a random album at each
    /// album boundary.
    AlbumShuffle,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Sequential
    }
}

impl Mode {
    /// Stable name used for persistence in the settings table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::TrackShuffle => "track-shuffle",
            Self::AlbumShuffle => "album-shuffle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sequential" => Some(Self::Sequential),
            "track-shuffle" => Some(Self::TrackShuffle),
            "album-shuffle" => Some(Self::AlbumShuffle),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("the library contains no songs")]
    EmptyLibrary,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Resolver {
    store: Store,
    mode: Mode,
}

impl Resolver {
    pub fn new(store: Store, mode: Mode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// The starting song for the current mode.
    pub fn first(&self) -> Result<Song, ResolveError> {
        let song = match self.mode {
            Mode::Sequential => self.store.first_song()?,
            Mode::TrackShuffle => self.store.random_song()?,
            Mode::AlbumShuffle => self.store.random_album_start(None)?,
        };
        song.ok_or(ResolveError::EmptyLibrary)
    }

    /// The final song for the current mode.
    pub fn last(&self) -> Result<Song, ResolveError> {
        let song = match self.mode {
            Mode::Sequential => self.store.last_song()?,
            Mode::TrackShuffle => self.store.random_song()?,
            Mode::AlbumShuffle => self.store.random_album_start(None)?,
        };
        song.ok_or(ResolveError::EmptyLibrary)
    }

    /// The song after `current`. Sequential wraps to the collection start;
    /// album shuffle jumps to a fresh album's first track at the boundary.
    pub fn next(&self, current: &SongKey) -> Result<Song, ResolveError> {
        let song = match self.mode {
            Mode::Sequential => match self.store.next_after(current)? {
                Some(song) => Some(song),
                None => self.store.first_song()?,
            },
            Mode::TrackShuffle => self.store.random_song()?,
            Mode::AlbumShuffle => match self.store.album_next(current)? {
                Some(song) => Some(song),
                None => self.store.random_album_start(Some(&album_of(current)))?,
            },
        };
        song.ok_or(ResolveError::EmptyLibrary)
    }

    /// The song before `current`, mirroring [`Resolver::next`].
    pub fn previous(&self, current: &SongKey) -> Result<Song, ResolveError> {
        let song = match self.mode {
            Mode::Sequential => match self.store.previous_before(current)? {
                Some(song) => Some(song),
                None => self.store.last_song()?,
            },
            Mode::TrackShuffle => self.store.random_song()?,
            Mode::AlbumShuffle => match self.store.album_previous(current)? {
                Some(song) => Some(song),
                None => {
                    // Falling backward out of an album lands on the *last*
                    // track of the fresh album.
                    match self.store.random_album(Some(&album_of(current)))? {
                        Some(album) => self.store.last_of_album(&album)?,
                        None => self.store.last_of_album(&album_of(current))?,
                    }
                }
            },
        };
        song.ok_or(ResolveError::EmptyLibrary)
    }
}

fn album_of(key: &SongKey) -> AlbumId {
    AlbumId {
        artist: key.artist.clone(),
        title: key.album.clone(),
    }
}
