//! String handles: inline literals and the content-addressed dedup index.
//!
//! Strings of at most four bytes without a NUL byte live entirely inside
//! their handle: the bytes occupy the low 32 bits (first byte lowest) and
//! bits 32..40 are all ones. Longer strings are stored in the arena as a
//! varint length followed by the raw bytes.

use std::cmp::Ordering;
use std::fmt;

use crate::types::{ArenaError, Handle, Result};

/// Bits 32..40 set: marks a handle as an inline string.
pub const INLINE_TAG: u64 = 0x0000_00ff_0000_0000;
/// Longest string that can be encoded inline.
pub const INLINE_MAX_LEN: usize = 4;
/// Default number of dedup buckets.
pub const DEFAULT_BUCKET_COUNT: usize = 31_607;
/// Buckets longer than this count as crowded in statistics.
pub const CROWDED_BUCKET_LEN: usize = 16;
/// Hard cap on handles kept in a single bucket.
pub const MAX_BUCKET_LEN: usize = 1 << 24;

const HASH_SAMPLES: usize = 7;

/// Returns true when `handle` carries an inline literal.
pub fn is_inline(handle: Handle) -> bool {
    handle.0 & INLINE_TAG == INLINE_TAG
}

/// Packs `bytes` into an inline handle when they fit.
pub fn encode_inline(bytes: &[u8]) -> Option<Handle> {
    if bytes.len() > INLINE_MAX_LEN || bytes.contains(&0) {
        return None;
    }
    let mut packed = [0u8; 4];
    packed[..bytes.len()].copy_from_slice(bytes);
    Some(Handle(INLINE_TAG | u64::from(u32::from_le_bytes(packed))))
}

/// Unpacks the literal of an inline handle; stops at the first zero byte.
pub fn decode_inline(handle: Handle) -> Vec<u8> {
    let packed = (handle.0 as u32).to_le_bytes();
    packed.iter().copied().take_while(|&b| b != 0).collect()
}

/// Samples seven evenly spread bytes, folding alternating low and high
/// nibbles into the bucket index.
pub fn content_hash(bytes: &[u8], bucket_count: usize) -> usize {
    let len = bytes.len();
    let mut hash = 0usize;
    if len > 0 {
        for i in 0..HASH_SAMPLES {
            let byte = bytes[(i * len / HASH_SAMPLES) % len];
            let nibble = if i % 2 == 0 { byte & 0x0f } else { byte >> 4 };
            hash = (hash << 4) | nibble as usize;
        }
    }
    hash % bucket_count
}

/// Dedup index occupancy.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct StringTableStats {
    /// Buckets holding at least one string.
    pub buckets_used: u64,
    /// Total bucket count.
    pub bucket_count: u64,
    /// Distinct stored strings indexed.
    pub strings: u64,
    /// Buckets holding more than [`CROWDED_BUCKET_LEN`] strings.
    pub crowded_buckets: u64,
}

impl fmt::Display for StringTableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hash efficiency=[{}/{}/{}/{}]",
            self.buckets_used, self.bucket_count, self.strings, self.crowded_buckets
        )
    }
}

/// Hash buckets of stored-string handles, each sorted by content.
pub(crate) struct StringTable {
    buckets: Vec<Vec<Handle>>,
    strings: u64,
}

impl StringTable {
    pub fn new(bucket_count: usize) -> Result<Self> {
        if bucket_count == 0 {
            return Err(ArenaError::Invalid("string table needs at least one bucket"));
        }
        Ok(Self {
            buckets: vec![Vec::new(); bucket_count],
            strings: 0,
        })
    }

    pub fn bucket_for(&self, bytes: &[u8]) -> usize {
        content_hash(bytes, self.buckets.len())
    }

    /// Binary-searches `bucket` with `compare(existing)` giving the order of
    /// the new string relative to `existing`. Returns the matching handle, or
    /// inserts `candidate` at its sorted position and returns it.
    pub fn find_or_insert<F>(
        &mut self,
        bucket: usize,
        candidate: Handle,
        mut compare: F,
    ) -> Result<Handle>
    where
        F: FnMut(Handle) -> Result<Ordering>,
    {
        let entries = &mut self.buckets[bucket];
        let mut lo = 0usize;
        let mut hi = entries.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match compare(entries[mid])? {
                Ordering::Greater => lo = mid + 1,
                Ordering::Less => hi = mid,
                Ordering::Equal => return Ok(entries[mid]),
            }
        }
        if entries.len() >= MAX_BUCKET_LEN {
            return Err(ArenaError::Capacity("string table bucket full"));
        }
        entries.insert(lo, candidate);
        self.strings += 1;
        Ok(candidate)
    }

    /// Removes a handle inserted by a failed append.
    pub fn forget(&mut self, bucket: usize, handle: Handle) {
        let entries = &mut self.buckets[bucket];
        if let Some(pos) = entries.iter().position(|&h| h == handle) {
            entries.remove(pos);
            self.strings -= 1;
        }
    }

    pub fn stats(&self) -> StringTableStats {
        let mut stats = StringTableStats {
            bucket_count: self.buckets.len() as u64,
            strings: self.strings,
            ..StringTableStats::default()
        };
        for bucket in &self.buckets {
            if !bucket.is_empty() {
                stats.buckets_used += 1;
            }
            if bucket.len() > CROWDED_BUCKET_LEN {
                stats.crowded_buckets += 1;
            }
        }
        stats
    }
}
