use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::controller::EvictionController;
use super::directory::{PageDirectory, SharedDirectory, StoreStats, SwapSpace};
use crate::primitives::io::{FileIo, TempSwapFile};
use crate::types::{ArenaError, PageId, Result, StoreId};

/// A logically unbounded byte sequence made of fixed-size pages that are
/// individually resident in memory or swapped out to a private file.
///
/// Offsets map to pages by shifting: `page = index >> page_shift`. The store
/// grows by whole pages and never shrinks below its logical size.
///
/// A store is a single-writer value: every mutation takes `&mut self`. Reads
/// take `&self` and may still reload pages internally.
pub struct PagedByteStore {
    id: StoreId,
    size: u64,
    capacity: u64,
    // End of bytes a failed append may have left behind past `size`.
    stale_end: u64,
    page_shift: u32,
    paging: bool,
    directory: SharedDirectory,
    controller: Arc<EvictionController>,
}

impl PagedByteStore {
    /// Creates an empty store attached to `controller`.
    ///
    /// When paging is enabled a swap file is created in the configured swap
    /// directory. If that fails the store keeps every page resident.
    pub fn new(controller: &Arc<EvictionController>) -> Self {
        let plan = controller.plan();
        let swap = if plan.enabled {
            match TempSwapFile::create_in(&plan.swap_dir) {
                Ok(file) => Some(SwapSpace::from_temp_file(file)),
                Err(err) => {
                    warn!(
                        swap_dir = %plan.swap_dir.display(),
                        error = %err,
                        "swaparena.pager.degraded"
                    );
                    None
                }
            }
        } else {
            None
        };
        Self::attach(controller, swap)
    }

    /// Creates a paging store that spills into a caller-provided file.
    ///
    /// When the controller has paging disabled `io` is dropped and the store
    /// keeps every page resident.
    pub fn with_swap_io(controller: &Arc<EvictionController>, io: Box<dyn FileIo>) -> Self {
        let swap = controller.plan().enabled.then(|| SwapSpace::from_io(io));
        Self::attach(controller, swap)
    }

    fn attach(controller: &Arc<EvictionController>, swap: Option<SwapSpace>) -> Self {
        let page_shift = controller.plan().page_shift;
        let paging = swap.is_some();
        let directory = Arc::new(Mutex::new(PageDirectory::new(page_shift, swap)));
        let id = controller.allocate_store_id();
        if paging {
            controller.register(id, Arc::clone(&directory));
        }
        Self {
            id,
            size: 0,
            capacity: 0,
            stale_end: 0,
            page_shift,
            paging,
            directory,
            controller: Arc::clone(controller),
        }
    }

    /// Identity of this store inside its controller.
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// High-water mark of appended or allocated bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes covered by allocated pages; a multiple of the page size.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        1usize << self.page_shift
    }

    /// Whether pages of this store can be swapped out.
    pub fn is_paging(&self) -> bool {
        self.paging
    }

    /// Location of the swap file, if this store owns one.
    pub fn swap_path(&self) -> Option<PathBuf> {
        self.directory.lock().swap_path()
    }

    /// The controller this store reports to.
    pub fn controller(&self) -> &Arc<EvictionController> {
        &self.controller
    }

    /// Reads the byte at `index`.
    pub fn get(&self, index: u64) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(index, &mut byte)?;
        Ok(byte[0])
    }

    /// Overwrites the byte at `index`.
    pub fn set(&mut self, index: u64, value: u8) -> Result<()> {
        self.write(index, &[value])
    }

    /// Fills `dst` with the bytes starting at `index`, crossing pages as needed.
    pub fn read_into(&self, index: u64, dst: &mut [u8]) -> Result<()> {
        self.check_range(index, dst.len())?;
        if dst.is_empty() {
            return Ok(());
        }
        let recency = self.touch();
        let mut reloaded = Vec::new();
        let result = self
            .directory
            .lock()
            .read(index, dst, recency, &mut reloaded);
        self.notify(&reloaded);
        result
    }

    /// Copies `len` bytes starting at `index` into a new vector.
    pub fn to_vec(&self, index: u64, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.read_into(index, &mut out)?;
        Ok(out)
    }

    /// Overwrites existing bytes starting at `index`.
    pub fn write(&mut self, index: u64, src: &[u8]) -> Result<()> {
        self.check_range(index, src.len())?;
        self.write_unchecked(index, src)
    }

    /// Appends `bytes` and returns the offset of the first one.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let index = self.allocate(bytes.len() as u64)?;
        if let Err(err) = self.write_unchecked(index, bytes) {
            self.stale_end = self.stale_end.max(self.size);
            self.size = index;
            return Err(err);
        }
        Ok(index)
    }

    /// Appends one byte and returns its offset.
    pub fn push(&mut self, byte: u8) -> Result<u64> {
        self.append(&[byte])
    }

    /// Reserves `len` zero-initialized bytes and returns the offset of the
    /// first one.
    pub fn allocate(&mut self, len: u64) -> Result<u64> {
        let index = self.size;
        let required = index
            .checked_add(len)
            .ok_or(ArenaError::Capacity("store address space exhausted"))?;
        self.ensure_capacity(required);
        if index < self.stale_end {
            self.zero_fill(index, required.min(self.stale_end))?;
        }
        self.size = required;
        Ok(index)
    }

    /// Releases trailing pages that hold no byte below `size`.
    pub fn trim_to_size(&mut self) {
        let page_size = self.page_size() as u64;
        let mut released = 0usize;
        {
            let mut dir = self.directory.lock();
            while self.size + page_size <= self.capacity {
                if dir.pop_page().is_none() {
                    break;
                }
                self.capacity -= page_size;
                released += 1;
            }
        }
        self.stale_end = self.stale_end.min(self.capacity);
        if released > 0 {
            debug!(
                store = %self.id,
                released,
                capacity = self.capacity,
                "swaparena.pager.trimmed"
            );
        }
    }

    /// Returns a snapshot of this store's counters.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.directory.lock().stats();
        stats.size = self.size;
        stats.capacity = self.capacity;
        stats
    }

    fn write_unchecked(&mut self, index: u64, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let recency = self.touch();
        let mut reloaded = Vec::new();
        let result = self
            .directory
            .lock()
            .write(index, src, recency, &mut reloaded);
        self.notify(&reloaded);
        result
    }

    fn zero_fill(&mut self, mut from: u64, to: u64) -> Result<()> {
        let zeros = vec![0u8; self.page_size()];
        while from < to {
            let len = (to - from).min(zeros.len() as u64) as usize;
            self.write_unchecked(from, &zeros[..len])?;
            from += len as u64;
        }
        Ok(())
    }

    fn ensure_capacity(&mut self, required: u64) {
        if required <= self.capacity {
            return;
        }
        let page_size = self.page_size() as u64;
        let recency = self.touch();
        let mut created: Vec<PageId> = Vec::new();
        {
            let mut dir = self.directory.lock();
            while self.capacity < required {
                created.push(dir.push_page(recency));
                self.capacity += page_size;
            }
        }
        self.notify(&created);
    }

    fn check_range(&self, index: u64, len: usize) -> Result<()> {
        match index.checked_add(len as u64) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(ArenaError::IndexOutOfRange {
                index,
                size: self.size,
            }),
        }
    }

    fn touch(&self) -> u64 {
        if self.paging {
            self.controller.tick()
        } else {
            0
        }
    }

    // Called with the directory unlocked; housekeeping locks it again.
    fn notify(&self, pages: &[PageId]) {
        if self.paging {
            self.controller.note_resident(self.id, pages);
        }
    }
}

impl Drop for PagedByteStore {
    fn drop(&mut self) {
        if self.paging {
            self.controller.deregister(self.id);
        }
    }
}

impl std::fmt::Debug for PagedByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedByteStore")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .field("paging", &self.paging)
            .finish()
    }
}
