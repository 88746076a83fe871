use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::options::ArenaOptions;
use super::strings::{
    decode_inline, encode_inline, is_inline, StringTable, StringTableStats, INLINE_TAG,
};
use crate::primitives::bytes::{le, var};
use crate::primitives::pager::{EvictionController, PagedByteStore, StoreStats};
use crate::types::{ArenaError, Handle, Result};

/// Highest arena size. Offsets at or above it would carry the inline tag.
pub const MAX_ARENA_SIZE: u64 = INLINE_TAG;
/// Width of a handle stored inside a record.
pub const HANDLE_FIELD_WIDTH: usize = 5;

const HANDLE_FIELD_LIMIT: u64 = 1 << (HANDLE_FIELD_WIDTH * 8);

/// Bump allocator of fixed-layout records and strings over a paged store.
///
/// Handles are byte offsets; offset 0 is a placeholder so the null handle
/// never names a record. Nothing is freed before the arena is dropped.
pub struct ObjectArena {
    store: PagedByteStore,
    strings: Option<StringTable>,
}

impl ObjectArena {
    /// Creates an arena with a fresh store attached to `controller`.
    pub fn new(controller: &Arc<EvictionController>, options: ArenaOptions) -> Result<Self> {
        Self::with_store(PagedByteStore::new(controller), options)
    }

    /// Wraps an empty store, consuming its first byte as the null placeholder.
    pub fn with_store(mut store: PagedByteStore, options: ArenaOptions) -> Result<Self> {
        if store.size() != 0 {
            return Err(ArenaError::Invalid("arena store must start empty"));
        }
        let strings = if options.dedup_strings {
            Some(StringTable::new(options.string_buckets)?)
        } else {
            None
        };
        store.push(0)?;
        Ok(Self { store, strings })
    }

    /// The backing store.
    pub fn store(&self) -> &PagedByteStore {
        &self.store
    }

    /// Bytes handed out so far, including the placeholder.
    pub fn size(&self) -> u64 {
        self.store.size()
    }

    /// Whether stored strings are deduplicated.
    pub fn dedup_enabled(&self) -> bool {
        self.strings.is_some()
    }

    /// Reserves a zeroed record of `size` bytes.
    pub fn new_object(&mut self, size: u32) -> Result<Handle> {
        self.check_growth(u64::from(size))?;
        let offset = self.store.allocate(u64::from(size))?;
        Ok(Handle(offset))
    }

    /// Reads the byte at `handle + offset`.
    pub fn get_byte(&self, handle: Handle, offset: u32) -> Result<u8> {
        self.store.get(field_address(handle, offset)?)
    }

    /// Writes the byte at `handle + offset`.
    pub fn set_byte(&mut self, handle: Handle, offset: u32, value: u8) -> Result<()> {
        self.store.set(field_address(handle, offset)?, value)
    }

    /// Reads a little-endian unsigned integer of `width` bytes.
    pub fn get_integer(&self, handle: Handle, offset: u32, width: usize) -> Result<u64> {
        le::check_width(width)?;
        let mut buf = [0u8; le::MAX_WIDTH];
        self.store
            .read_into(field_address(handle, offset)?, &mut buf[..width])?;
        Ok(le::get_uint(&buf[..width]))
    }

    /// Writes the low `width` bytes of `value` little-endian.
    pub fn set_integer(
        &mut self,
        handle: Handle,
        offset: u32,
        width: usize,
        value: u64,
    ) -> Result<()> {
        le::check_width(width)?;
        let mut buf = [0u8; le::MAX_WIDTH];
        le::put_uint(&mut buf[..width], value);
        self.store.write(field_address(handle, offset)?, &buf[..width])
    }

    /// Reads a 5-byte handle field.
    pub fn get_object_handle(&self, handle: Handle, offset: u32) -> Result<Handle> {
        self.get_integer(handle, offset, HANDLE_FIELD_WIDTH).map(Handle)
    }

    /// Writes a 5-byte handle field. Inline string handles fit as well.
    pub fn set_object_handle(
        &mut self,
        handle: Handle,
        offset: u32,
        value: Handle,
    ) -> Result<()> {
        if value.0 >= HANDLE_FIELD_LIMIT {
            return Err(ArenaError::Invalid("handle does not fit in 5 bytes"));
        }
        self.set_integer(handle, offset, HANDLE_FIELD_WIDTH, value.0)
    }

    /// Address arithmetic only; no bounds check and no I/O.
    pub fn handle_at_offset(handle: Handle, offset: u32) -> Handle {
        Handle(handle.0.wrapping_add(u64::from(offset)))
    }

    /// Stores a string and returns its handle.
    pub fn append_string(&mut self, value: &str) -> Result<Handle> {
        self.append_bytes(value.as_bytes())
    }

    /// Stores a byte string: inline when short, otherwise length-prefixed in
    /// the arena. With dedup on, equal contents share a handle.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<Handle> {
        if let Some(handle) = encode_inline(bytes) {
            return Ok(handle);
        }
        let len = bytes.len() as u64;
        let mut encoded = Vec::with_capacity(var::encoded_len(len) + bytes.len());
        var::encode_u64(len, &mut encoded);
        encoded.extend_from_slice(bytes);
        self.check_growth(encoded.len() as u64)?;

        let candidate = Handle(self.store.size());
        let bucket = match self.strings.as_mut() {
            Some(table) => {
                let bucket = table.bucket_for(bytes);
                let store = &self.store;
                let found = table.find_or_insert(bucket, candidate, |existing| {
                    compare_stored(store, existing, bytes)
                })?;
                if found != candidate {
                    return Ok(found);
                }
                Some(bucket)
            }
            None => None,
        };

        match self.store.append(&encoded) {
            Ok(offset) => Ok(Handle(offset)),
            Err(err) => {
                if let (Some(table), Some(bucket)) = (self.strings.as_mut(), bucket) {
                    table.forget(bucket, candidate);
                }
                Err(err)
            }
        }
    }

    /// Reads a string stored by [`Self::append_string`].
    pub fn read_string(&self, handle: Handle) -> Result<String> {
        String::from_utf8(self.read_bytes(handle)?)
            .map_err(|_| ArenaError::Corruption("stored string is not valid UTF-8"))
    }

    /// Reads the bytes behind a string handle.
    pub fn read_bytes(&self, handle: Handle) -> Result<Vec<u8>> {
        if handle.is_null() {
            return Err(ArenaError::InvalidHandle);
        }
        if is_inline(handle) {
            return Ok(decode_inline(handle));
        }
        let (len, prefix) = read_length(&self.store, handle)?;
        let start = handle.0 + prefix as u64;
        if start.saturating_add(len as u64) > self.store.size() {
            return Err(ArenaError::Corruption("string length runs past arena end"));
        }
        self.store.to_vec(start, len)
    }

    /// Releases trailing unused pages.
    pub fn compact(&mut self) {
        self.store.trim_to_size();
        debug!(
            store = %self.store.id(),
            size = self.store.size(),
            capacity = self.store.capacity(),
            "swaparena.arena.compacted"
        );
    }

    /// Snapshot of store and string-table counters.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            size: self.store.size(),
            capacity: self.store.capacity(),
            store: self.store.stats(),
            strings: self.strings.as_ref().map(StringTable::stats),
        }
    }

    fn check_growth(&self, len: u64) -> Result<()> {
        match self.store.size().checked_add(len) {
            Some(end) if end <= MAX_ARENA_SIZE => Ok(()),
            _ => Err(ArenaError::Capacity("arena offset ceiling reached")),
        }
    }
}

impl fmt::Debug for ObjectArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectArena")
            .field("store", &self.store)
            .field("dedup", &self.dedup_enabled())
            .finish()
    }
}

/// Counters reported by [`ObjectArena::stats`].
#[derive(Clone, Debug)]
pub struct ArenaStats {
    /// Logical arena size in bytes.
    pub size: u64,
    /// Bytes covered by allocated pages.
    pub capacity: u64,
    /// Paging counters of the backing store.
    pub store: StoreStats,
    /// Dedup index occupancy, when dedup is enabled.
    pub strings: Option<StringTableStats>,
}

impl fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Object buffer={} bytes ({} resident of {} pages, {} reloads, {} evictions)",
            self.size,
            self.store.resident_pages,
            self.store.pages,
            self.store.reloads,
            self.store.evictions
        )?;
        if let Some(strings) = &self.strings {
            write!(f, " {strings}")?;
        }
        Ok(())
    }
}

fn field_address(handle: Handle, offset: u32) -> Result<u64> {
    if handle.is_null() || is_inline(handle) {
        return Err(ArenaError::InvalidHandle);
    }
    handle
        .0
        .checked_add(u64::from(offset))
        .ok_or(ArenaError::InvalidHandle)
}

fn read_length(store: &PagedByteStore, handle: Handle) -> Result<(usize, usize)> {
    let (len, prefix) = var::decode_u64_with(|i| store.get(handle.0 + i as u64))?;
    let len = usize::try_from(len).map_err(|_| ArenaError::Corruption("string length overflow"))?;
    Ok((len, prefix))
}

// Order of `bytes` relative to the string stored at `existing`: by length,
// then by content.
fn compare_stored(store: &PagedByteStore, existing: Handle, bytes: &[u8]) -> Result<Ordering> {
    let (len, prefix) = read_length(store, existing)?;
    match bytes.len().cmp(&len) {
        Ordering::Equal => {
            let stored = store.to_vec(existing.0 + prefix as u64, len)?;
            Ok(bytes.cmp(stored.as_slice()))
        }
        other => Ok(other),
    }
}
