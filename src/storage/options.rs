use super::strings::DEFAULT_BUCKET_COUNT;

/// Configuration options supplied when creating an [`super::ObjectArena`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaOptions {
    /// Whether equal stored strings share one handle.
    pub dedup_strings: bool,
    /// Number of dedup hash buckets.
    pub string_buckets: usize,
}

impl Default for ArenaOptions {
    fn default() -> Self {
        Self {
            dedup_strings: false,
            string_buckets: DEFAULT_BUCKET_COUNT,
        }
    }
}

impl ArenaOptions {
    /// Options with string deduplication turned on.
    pub fn deduplicated() -> Self {
        Self {
            dedup_strings: true,
            ..Self::default()
        }
    }

    /// Enables or disables string deduplication.
    pub fn dedup_strings(mut self, enabled: bool) -> Self {
        self.dedup_strings = enabled;
        self
    }

    /// Sets the number of dedup buckets.
    pub fn string_buckets(mut self, buckets: usize) -> Self {
        self.string_buckets = buckets;
        self
    }
}
