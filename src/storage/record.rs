//! Typed views over arena records that carry a kind tag at offset 0.

use std::fmt;
use std::marker::PhantomData;

use super::arena::HANDLE_FIELD_WIDTH;
use super::HandleHeap;
use crate::types::{ArenaError, Handle, Result};

/// Offset of the kind tag inside every tagged record.
pub const TAG_OFFSET: u32 = 0;

/// A fixed-layout record kind.
///
/// `SIZE` includes the tag byte, so fields live in `1..SIZE`.
pub trait RecordKind {
    /// Tag byte stored at offset 0.
    const TAG: u8;
    /// Total record size in bytes.
    const SIZE: u32;
    /// Name used in diagnostics.
    const NAME: &'static str;
}

/// Reads the tag byte of the record at `handle` without checking it.
pub fn record_tag<H: HandleHeap + ?Sized>(heap: &H, handle: Handle) -> Result<u8> {
    heap.read_byte(handle, TAG_OFFSET)
}

/// Handle to a record whose tag has been validated against `K`.
pub struct Record<K> {
    handle: Handle,
    _kind: PhantomData<fn() -> K>,
}

impl<K: RecordKind> Record<K> {
    /// Allocates a zeroed record and writes its tag.
    pub fn create<H: HandleHeap + ?Sized>(heap: &mut H) -> Result<Self> {
        if K::SIZE == 0 {
            return Err(ArenaError::Invalid("record kind must leave room for its tag"));
        }
        let handle = heap.allocate(K::SIZE)?;
        heap.write_byte(handle, TAG_OFFSET, K::TAG)?;
        Ok(Self::wrap(handle))
    }

    /// Views an existing record, failing when its tag belongs to another kind.
    pub fn attach<H: HandleHeap + ?Sized>(heap: &H, handle: Handle) -> Result<Self> {
        if handle.is_null() {
            return Err(ArenaError::InvalidHandle);
        }
        let found = record_tag(heap, handle)?;
        if found != K::TAG {
            return Err(ArenaError::TagMismatch {
                expected: K::TAG,
                found,
            });
        }
        Ok(Self::wrap(handle))
    }

    fn wrap(handle: Handle) -> Self {
        Self {
            handle,
            _kind: PhantomData,
        }
    }

    /// The record's arena handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Reads a one-byte field.
    pub fn byte<H: HandleHeap + ?Sized>(&self, heap: &H, offset: u32) -> Result<u8> {
        check_field::<K>(offset, 1)?;
        heap.read_byte(self.handle, offset)
    }

    /// Writes a one-byte field.
    pub fn set_byte<H: HandleHeap + ?Sized>(
        &self,
        heap: &mut H,
        offset: u32,
        value: u8,
    ) -> Result<()> {
        check_field::<K>(offset, 1)?;
        heap.write_byte(self.handle, offset, value)
    }

    /// Reads a little-endian integer field of `width` bytes.
    pub fn integer<H: HandleHeap + ?Sized>(
        &self,
        heap: &H,
        offset: u32,
        width: usize,
    ) -> Result<u64> {
        check_field::<K>(offset, width)?;
        heap.read_integer(self.handle, offset, width)
    }

    /// Writes a little-endian integer field of `width` bytes.
    pub fn set_integer<H: HandleHeap + ?Sized>(
        &self,
        heap: &mut H,
        offset: u32,
        width: usize,
        value: u64,
    ) -> Result<()> {
        check_field::<K>(offset, width)?;
        heap.write_integer(self.handle, offset, width, value)
    }

    /// Reads a 5-byte handle field.
    pub fn handle_field<H: HandleHeap + ?Sized>(&self, heap: &H, offset: u32) -> Result<Handle> {
        check_field::<K>(offset, HANDLE_FIELD_WIDTH)?;
        heap.read_handle_field(self.handle, offset)
    }

    /// Writes a 5-byte handle field.
    pub fn set_handle_field<H: HandleHeap + ?Sized>(
        &self,
        heap: &mut H,
        offset: u32,
        value: Handle,
    ) -> Result<()> {
        check_field::<K>(offset, HANDLE_FIELD_WIDTH)?;
        heap.write_handle_field(self.handle, offset, value)
    }

    /// Resolves the string whose handle sits in the field at `offset`.
    /// A null field reads as `None`.
    pub fn string_field<H: HandleHeap + ?Sized>(
        &self,
        heap: &H,
        offset: u32,
    ) -> Result<Option<String>> {
        let handle = self.handle_field(heap, offset)?;
        if handle.is_null() {
            return Ok(None);
        }
        heap.resolve_string(handle).map(Some)
    }

    /// Interns `value` and stores its handle in the field at `offset`.
    pub fn set_string_field<H: HandleHeap + ?Sized>(
        &self,
        heap: &mut H,
        offset: u32,
        value: &str,
    ) -> Result<Handle> {
        check_field::<K>(offset, HANDLE_FIELD_WIDTH)?;
        let handle = heap.intern_string(value)?;
        heap.write_handle_field(self.handle, offset, handle)?;
        Ok(handle)
    }
}

fn check_field<K: RecordKind>(offset: u32, width: usize) -> Result<()> {
    let end = u64::from(offset) + width as u64;
    if offset == TAG_OFFSET || end > u64::from(K::SIZE) {
        return Err(ArenaError::Invalid("field outside record layout"));
    }
    Ok(())
}

impl<K> Clone for Record<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Record<K> {}

impl<K> PartialEq for Record<K> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<K> Eq for Record<K> {}

impl<K: RecordKind> fmt::Debug for Record<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", K::NAME, self.handle)
    }
}
