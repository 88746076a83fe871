use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use super::frame::Page;
use crate::primitives::io::{FileIo, TempSwapFile};
use crate::types::{ArenaError, PageId, Result};

/// Growth step of the page directory, in pages.
const DIRECTORY_GROWTH: usize = 256;

pub(crate) type SharedDirectory = Arc<Mutex<PageDirectory>>;

/// Append-only swap space backing one store.
pub(crate) struct SwapSpace {
    io: Box<dyn FileIo>,
    next_slot: u64,
    path: Option<PathBuf>,
}

impl SwapSpace {
    pub fn from_temp_file(file: TempSwapFile) -> Self {
        let path = Some(file.path());
        Self {
            io: Box::new(file),
            next_slot: 0,
            path,
        }
    }

    pub fn from_io(io: Box<dyn FileIo>) -> Self {
        Self {
            io,
            next_slot: 0,
            path: None,
        }
    }
}

/// Counters kept per store.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    /// Logical size in bytes.
    pub size: u64,
    /// Bytes covered by allocated pages.
    pub capacity: u64,
    /// Pages in the directory.
    pub pages: u64,
    /// Pages currently holding an in-memory buffer.
    pub resident_pages: u64,
    /// Pages read back from the swap file.
    pub reloads: u64,
    /// Page images written to the swap file.
    pub flushes: u64,
    /// Swap writes that failed and left the page resident.
    pub flush_failures: u64,
    /// In-memory buffers released.
    pub evictions: u64,
    /// Bytes of swap space assigned to pages.
    pub swap_bytes: u64,
}

/// Result of asking a directory to release one page.
pub(crate) enum EvictOutcome {
    Released { flushed_bytes: u64 },
    FlushFailed(io::Error),
    NotResident,
}

/// The pages of one store plus the swap space they spill into.
pub(crate) struct PageDirectory {
    page_shift: u32,
    page_size: usize,
    pages: Vec<Page>,
    swap: Option<SwapSpace>,
    stats: StoreStats,
}

impl PageDirectory {
    pub fn new(page_shift: u32, swap: Option<SwapSpace>) -> Self {
        Self {
            page_shift,
            page_size: 1usize << page_shift,
            pages: Vec::with_capacity(DIRECTORY_GROWTH),
            swap,
            stats: StoreStats::default(),
        }
    }

    pub fn swap_path(&self) -> Option<PathBuf> {
        self.swap.as_ref().and_then(|swap| swap.path.clone())
    }

    pub fn push_page(&mut self, recency: u64) -> PageId {
        if self.pages.len() == self.pages.capacity() {
            self.pages.reserve(DIRECTORY_GROWTH);
        }
        let id = PageId(self.pages.len() as u64);
        self.pages.push(Page::new(self.page_size, recency));
        id
    }

    pub fn pop_page(&mut self) -> Option<PageId> {
        self.pages.pop()?;
        Some(PageId(self.pages.len() as u64))
    }

    /// Recency of `id` when it is resident.
    pub fn resident_recency(&self, id: PageId) -> Option<u64> {
        self.pages
            .get(id.0 as usize)
            .filter(|page| page.is_resident())
            .map(|page| page.keep_priority())
    }

    pub fn resident_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_resident()).count()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.pages = self.pages.len() as u64;
        stats.resident_pages = self.resident_count() as u64;
        stats.swap_bytes = self.swap.as_ref().map_or(0, |swap| swap.next_slot);
        stats
    }

    /// Copies `dst.len()` bytes starting at `offset`. Pages that had to be
    /// reloaded are pushed onto `reloaded`, also when a later page fails.
    pub fn read(
        &mut self,
        offset: u64,
        dst: &mut [u8],
        recency: u64,
        reloaded: &mut Vec<PageId>,
    ) -> Result<()> {
        let mut done = 0usize;
        while done < dst.len() {
            let pos = offset + done as u64;
            let (id, start, len) = self.span(pos, dst.len() - done);
            if self.ensure_resident(id)? {
                reloaded.push(id);
            }
            let page = &mut self.pages[id.0 as usize];
            page.recency = recency;
            if let Some(buf) = page.buf.as_deref() {
                dst[done..done + len].copy_from_slice(&buf[start..start + len]);
            }
            done += len;
        }
        Ok(())
    }

    /// Overwrites bytes starting at `offset`. Reloaded pages are reported
    /// the same way as for [`PageDirectory::read`].
    pub fn write(
        &mut self,
        offset: u64,
        src: &[u8],
        recency: u64,
        reloaded: &mut Vec<PageId>,
    ) -> Result<()> {
        let mut done = 0usize;
        while done < src.len() {
            let pos = offset + done as u64;
            let (id, start, len) = self.span(pos, src.len() - done);
            if self.ensure_resident(id)? {
                reloaded.push(id);
            }
            let page = &mut self.pages[id.0 as usize];
            page.recency = recency;
            page.dirty = true;
            if let Some(buf) = page.buf.as_deref_mut() {
                buf[start..start + len].copy_from_slice(&src[done..done + len]);
            }
            done += len;
        }
        Ok(())
    }

    /// Writes the page to swap if dirty, then drops its buffer.
    pub fn evict(&mut self, id: PageId) -> EvictOutcome {
        let page_size = self.page_size as u64;
        let Some(page) = self.pages.get_mut(id.0 as usize) else {
            return EvictOutcome::NotResident;
        };
        let Some(buf) = page.buf.as_deref() else {
            return EvictOutcome::NotResident;
        };
        let mut flushed_bytes = 0;
        if page.dirty {
            let Some(swap) = self.swap.as_mut() else {
                return EvictOutcome::FlushFailed(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "store has no swap space",
                ));
            };
            let slot = *page.swap_slot.get_or_insert_with(|| {
                let slot = swap.next_slot;
                swap.next_slot += page_size;
                slot
            });
            if let Err(err) = swap.io.write_at(slot, buf) {
                self.stats.flush_failures += 1;
                return EvictOutcome::FlushFailed(err);
            }
            page.dirty = false;
            flushed_bytes = page_size;
            self.stats.flushes += 1;
        }
        page.buf = None;
        self.stats.evictions += 1;
        EvictOutcome::Released { flushed_bytes }
    }

    /// Splits an access at `pos` into (page, offset in page, bytes in page).
    fn span(&self, pos: u64, remaining: usize) -> (PageId, usize, usize) {
        let id = PageId(pos >> self.page_shift);
        let start = (pos & (self.page_size as u64 - 1)) as usize;
        let len = remaining.min(self.page_size - start);
        (id, start, len)
    }

    /// Materializes a swapped-out page. Returns true when a reload happened.
    fn ensure_resident(&mut self, id: PageId) -> Result<bool> {
        let page = self
            .pages
            .get(id.0 as usize)
            .ok_or(ArenaError::Corruption("access beyond the page directory"))?;
        if page.is_resident() {
            return Ok(false);
        }
        let slot = page
            .swap_slot
            .ok_or(ArenaError::Corruption("swapped-out page has no swap slot"))?;
        let swap = self
            .swap
            .as_ref()
            .ok_or(ArenaError::Corruption("swapped-out page without swap space"))?;
        let mut buf = vec![0u8; self.page_size].into_boxed_slice();
        swap.io
            .read_at(slot, &mut buf)
            .map_err(|source| ArenaError::PageReloadFailure { page: id, source })?;
        let page = &mut self.pages[id.0 as usize];
        page.buf = Some(buf);
        page.dirty = false;
        self.stats.reloads += 1;
        Ok(true)
    }
}
