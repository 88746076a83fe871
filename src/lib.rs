//! swaparena: a handle-addressed object arena backed by swappable pages.
//!
//! Large document trees are kept as fixed-layout records in an
//! [`storage::ObjectArena`]. The arena sits on a
//! [`primitives::pager::PagedByteStore`], whose pages spill to a private
//! swap file when the shared [`primitives::pager::EvictionController`]
//! finds more pages resident than its budget allows.

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;

pub use primitives::pager::{EvictionController, PagedByteStore, PagingOptions};
pub use storage::{ArenaOptions, HandleHeap, ObjectArena, Record, RecordKind};
pub use types::{ArenaError, Handle, Result};
