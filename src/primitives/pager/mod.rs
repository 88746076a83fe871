#![forbid(unsafe_code)]
//! Paged byte storage with memory-pressure-driven swapping.
//!
//! [`PagedByteStore`] splits a growable byte sequence into fixed-size pages.
//! Each page reports to an [`EvictionController`] when it becomes resident;
//! the controller periodically writes the least recently touched pages to
//! their store's swap file and drops their buffers.

mod controller;
mod directory;
mod frame;
mod options;
mod store;

pub use controller::{ControllerStats, EvictionController, HousekeepingReport};
pub use directory::StoreStats;
pub use options::{
    PagingOptions, PagingPlan, DEFAULT_BATCH_CAP, DEFAULT_MEMORY_THRESHOLD_PERCENT,
    DEFAULT_PAGE_SHIFT, MAX_PAGE_SHIFT, MIN_PAGE_SHIFT,
};
pub use store::PagedByteStore;
