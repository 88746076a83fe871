#![forbid(unsafe_code)]
//! Identifier newtypes and the crate-wide error type.

use std::fmt;
use std::io;

/// Byte offset into an arena, or an encoded inline string.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Handle(pub u64);

impl Handle {
    /// The null handle. Offset 0 is never issued by an arena.
    pub const NULL: Handle = Handle(0);

    /// Returns true for the null handle.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the raw handle value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Handle {
    fn from(value: u64) -> Self {
        Handle(value)
    }
}

impl From<Handle> for u64 {
    fn from(value: Handle) -> Self {
        value.0
    }
}

/// Index of a page inside one store's page directory.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a store registered with an eviction controller.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct StoreId(pub u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by the paged store and the object arena.
#[derive(thiserror::Error, Debug)]
pub enum ArenaError {
    /// Underlying I/O failure outside of page reloads.
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    /// Access outside the `[0, size)` range of a store.
    #[error("index {index} out of range (size {size})")]
    IndexOutOfRange {
        /// First offending index.
        index: u64,
        /// Store size at the time of the access.
        size: u64,
    },
    /// The null handle was dereferenced.
    #[error("invalid handle")]
    InvalidHandle,
    /// A swapped-out page could not be read back from the swap file.
    #[error("failed to reload page {page} from swap: {source}")]
    PageReloadFailure {
        /// Page that failed to materialize.
        page: PageId,
        /// Read error reported by the swap file.
        #[source]
        source: io::Error,
    },
    /// A record's stored tag byte differs from the requested kind.
    #[error("record tag mismatch: expected {expected:#04x}, found {found:#04x}")]
    TagMismatch {
        /// Tag of the requested kind.
        expected: u8,
        /// Tag stored at offset 0 of the record.
        found: u8,
    },
    /// A fixed-size table or address space is exhausted.
    #[error("capacity exceeded: {0}")]
    Capacity(&'static str),
    /// Stored bytes do not decode.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// A caller supplied an argument outside the supported range.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ArenaError>;
