//! Lazy pagination buffer: random access over the ordered song collection
//! without materializing it.
//!
//! At construction one ranked query captures the ordering key of every
//! P-th row (the anchors). Accessing index `i` fetches at most one page via
//! a keyset query ("P rows with key >= anchors[i / P]"), so far-offset
//! access costs the same as near-offset access.

use thiserror::Error;

use crate::library::{Song, SongKey, Store, StoreError};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum PagesError {
    #[error("index {index} out of bounds for collection of length {len}")]
    OutOfBounds { index: u64, len: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SongPages {
    store: Store,
    page_size: u32,
    len: u64,
    anchors: Vec<SongKey>,
    page: Option<usize>,
    buffer: Vec<Song>,
    fetches: u64,
}

impl SongPages {
    /// Snapshot the collection size and the anchor list. The buffer assumes
    /// the store is not rebuilt underneath it (scans happen before playback
    /// components are constructed).
    pub fn new(store: Store, page_size: u32) -> Result<Self, PagesError> {
        let page_size = page_size.max(1);
        let len = store.count_songs()?;
        let anchors = store.page_anchors(page_size)?;
        Ok(Self {
            store,
            page_size,
            len,
            anchors,
            page: None,
            buffer: Vec::new(),
            fetches: 0,
        })
    }

    /// Logical collection length.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of page fetches issued so far. Repeated access inside the
    /// cached page costs nothing; each page-boundary crossing costs one.
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    /// The song at logical index `index` in canonical order.
    pub fn get(&mut self, index: u64) -> Result<&Song, PagesError> {
        if index >= self.len {
            return Err(PagesError::OutOfBounds {
                index,
                len: self.len,
            });
        }
        let page = (index / u64::from(self.page_size)) as usize;
        if self.page != Some(page) {
            self.load(page)?;
        }
        let offset = (index % u64::from(self.page_size)) as usize;
        // Anchors and page fetches share one ordering; a short page here
        // means the store was rebuilt underneath us.
        self.buffer.get(offset).ok_or(PagesError::OutOfBounds {
            index,
            len: self.len,
        })
    }

    fn load(&mut self, page: usize) -> Result<(), PagesError> {
        let anchor = self.anchors.get(page).ok_or(PagesError::OutOfBounds {
            index: page as u64 * u64::from(self.page_size),
            len: self.len,
        })?;
        self.buffer = self.store.page_at(anchor, self.page_size)?;
        self.page = Some(page);
        self.fetches += 1;
        Ok(())
    }
}
