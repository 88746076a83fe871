//! Handle-addressed object arena over the paged store.
//!
//! Records are fixed-layout byte ranges bump-allocated in an
//! [`ObjectArena`] and addressed by [`Handle`]s. Strings are either packed
//! inline into their handle or stored length-prefixed, optionally
//! deduplicated. Tree and document layers consume the arena through the
//! [`HandleHeap`] trait.

mod arena;
mod options;
mod record;
mod strings;
mod symbols;

use crate::types::{Handle, Result};

pub use arena::{ArenaStats, ObjectArena, HANDLE_FIELD_WIDTH, MAX_ARENA_SIZE};
pub use options::ArenaOptions;
pub use record::{record_tag, Record, RecordKind, TAG_OFFSET};
pub use strings::{
    content_hash, decode_inline, encode_inline, is_inline, StringTableStats,
    CROWDED_BUCKET_LEN, DEFAULT_BUCKET_COUNT, INLINE_MAX_LEN, INLINE_TAG,
};
pub use symbols::{SymbolId, SymbolTable};

/// Record storage addressed by handles.
pub trait HandleHeap {
    /// Reserves a zeroed record of `size` bytes.
    fn allocate(&mut self, size: u32) -> Result<Handle>;
    /// Reads the byte at `handle + offset`.
    fn read_byte(&self, handle: Handle, offset: u32) -> Result<u8>;
    /// Writes the byte at `handle + offset`.
    fn write_byte(&mut self, handle: Handle, offset: u32, value: u8) -> Result<()>;
    /// Reads a little-endian integer of `width` bytes.
    fn read_integer(&self, handle: Handle, offset: u32, width: usize) -> Result<u64>;
    /// Writes a little-endian integer of `width` bytes.
    fn write_integer(&mut self, handle: Handle, offset: u32, width: usize, value: u64)
        -> Result<()>;
    /// Reads a 5-byte handle field.
    fn read_handle_field(&self, handle: Handle, offset: u32) -> Result<Handle>;
    /// Writes a 5-byte handle field.
    fn write_handle_field(&mut self, handle: Handle, offset: u32, value: Handle) -> Result<()>;
    /// Stores a string and returns its handle.
    fn intern_string(&mut self, value: &str) -> Result<Handle>;
    /// Reads back a string handle.
    fn resolve_string(&self, handle: Handle) -> Result<String>;
    /// Releases unused trailing storage.
    fn compact(&mut self);
}

impl HandleHeap for ObjectArena {
    fn allocate(&mut self, size: u32) -> Result<Handle> {
        self.new_object(size)
    }

    fn read_byte(&self, handle: Handle, offset: u32) -> Result<u8> {
        self.get_byte(handle, offset)
    }

    fn write_byte(&mut self, handle: Handle, offset: u32, value: u8) -> Result<()> {
        self.set_byte(handle, offset, value)
    }

    fn read_integer(&self, handle: Handle, offset: u32, width: usize) -> Result<u64> {
        self.get_integer(handle, offset, width)
    }

    fn write_integer(
        &mut self,
        handle: Handle,
        offset: u32,
        width: usize,
        value: u64,
    ) -> Result<()> {
        self.set_integer(handle, offset, width, value)
    }

    fn read_handle_field(&self, handle: Handle, offset: u32) -> Result<Handle> {
        self.get_object_handle(handle, offset)
    }

    fn write_handle_field(&mut self, handle: Handle, offset: u32, value: Handle) -> Result<()> {
        self.set_object_handle(handle, offset, value)
    }

    fn intern_string(&mut self, value: &str) -> Result<Handle> {
        self.append_string(value)
    }

    fn resolve_string(&self, handle: Handle) -> Result<String> {
        self.read_string(handle)
    }

    fn compact(&mut self) {
        ObjectArena::compact(self)
    }
}
