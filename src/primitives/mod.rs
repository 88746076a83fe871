//! Low-level primitives for building the arena.
//!
//! Includes byte encodings, positioned file I/O for swap files, and the
//! paged byte store with its eviction controller.

/// Varint and little-endian integer encodings.
pub mod bytes;

/// Positioned file I/O and private swap files.
pub mod io;

/// Paged, swappable byte storage.
///
/// Manages fixed-size pages, their residency, and the shared eviction budget.
pub mod pager;
