use std::path::PathBuf;

use sysinfo::System;

use crate::types::{ArenaError, Result};

/// Default page size exponent (65,536-byte pages).
pub const DEFAULT_PAGE_SHIFT: u32 = 16;
/// Smallest supported page size exponent.
pub const MIN_PAGE_SHIFT: u32 = 8;
/// Largest supported page size exponent.
pub const MAX_PAGE_SHIFT: u32 = 24;
/// Share of the memory ceiling that resident pages may occupy, in percent.
pub const DEFAULT_MEMORY_THRESHOLD_PERCENT: u8 = 70;
/// Upper bound for the default eviction batch and check interval.
pub const DEFAULT_BATCH_CAP: usize = 127;

/// Configuration for the paging and eviction subsystem.
///
/// Every field except the page shift is a ceiling or an override; the
/// defaults derive the resident page budget from the host's total memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PagingOptions {
    /// Page size as a power of two.
    pub page_shift: u32,
    /// Percentage of the memory ceiling available to resident pages. `0`
    /// disables paging entirely and keeps every page resident.
    pub memory_threshold_percent: u8,
    /// Memory ceiling in bytes; defaults to the host's total memory.
    pub memory_ceiling_bytes: Option<u64>,
    /// Explicit resident page budget, bypassing the threshold computation.
    pub resident_page_budget: Option<usize>,
    /// Minimum number of pages released per housekeeping pass.
    pub batch_size: Option<usize>,
    /// Number of page materializations between housekeeping passes.
    pub check_interval: Option<usize>,
    /// Directory for swap files; defaults to the OS temp directory.
    pub swap_dir: Option<PathBuf>,
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            page_shift: DEFAULT_PAGE_SHIFT,
            memory_threshold_percent: DEFAULT_MEMORY_THRESHOLD_PERCENT,
            memory_ceiling_bytes: None,
            resident_page_budget: None,
            batch_size: None,
            check_interval: None,
            swap_dir: None,
        }
    }
}

impl PagingOptions {
    /// Options that keep every page resident and never touch the disk.
    pub fn in_memory() -> Self {
        Self {
            memory_threshold_percent: 0,
            ..Self::default()
        }
    }

    /// Sets the page size exponent.
    pub fn page_shift(mut self, shift: u32) -> Self {
        self.page_shift = shift;
        self
    }

    /// Sets the memory threshold percentage.
    pub fn memory_threshold_percent(mut self, percent: u8) -> Self {
        self.memory_threshold_percent = percent;
        self
    }

    /// Overrides the detected memory ceiling.
    pub fn memory_ceiling_bytes(mut self, bytes: u64) -> Self {
        self.memory_ceiling_bytes = Some(bytes);
        self
    }

    /// Pins the resident page budget.
    pub fn resident_page_budget(mut self, pages: usize) -> Self {
        self.resident_page_budget = Some(pages);
        self
    }

    /// Sets the eviction batch size.
    pub fn batch_size(mut self, pages: usize) -> Self {
        self.batch_size = Some(pages);
        self
    }

    /// Sets the housekeeping check interval.
    pub fn check_interval(mut self, materializations: usize) -> Self {
        self.check_interval = Some(materializations);
        self
    }

    /// Sets the directory that receives swap files.
    pub fn swap_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.swap_dir = Some(dir.into());
        self
    }

    /// Validates the options and derives the concrete paging plan.
    pub fn resolve(&self) -> Result<PagingPlan> {
        if !(MIN_PAGE_SHIFT..=MAX_PAGE_SHIFT).contains(&self.page_shift) {
            return Err(ArenaError::Invalid("page_shift must be within 8..=24"));
        }
        if self.memory_threshold_percent > 100 {
            return Err(ArenaError::Invalid("memory_threshold_percent exceeds 100"));
        }
        if self.batch_size == Some(0) || self.check_interval == Some(0) {
            return Err(ArenaError::Invalid("batch_size and check_interval must be non-zero"));
        }
        let page_size = 1usize << self.page_shift;
        let memory_ceiling = self.memory_ceiling_bytes.unwrap_or_else(host_memory_bytes);
        let resident_budget = match self.resident_page_budget {
            Some(pages) => pages.max(1),
            None => {
                let bytes = u128::from(memory_ceiling) * u128::from(self.memory_threshold_percent)
                    / 100;
                let pages = bytes / page_size as u128;
                usize::try_from(pages).unwrap_or(usize::MAX).max(1)
            }
        };
        let default_batch = (resident_budget / 2).min(DEFAULT_BATCH_CAP).max(1);
        Ok(PagingPlan {
            enabled: self.memory_threshold_percent > 0,
            page_shift: self.page_shift,
            page_size,
            memory_ceiling,
            resident_budget,
            batch_size: self.batch_size.unwrap_or(default_batch),
            check_interval: self.check_interval.unwrap_or(default_batch),
            swap_dir: self.swap_dir.clone().unwrap_or_else(std::env::temp_dir),
        })
    }
}

/// Resolved paging configuration shared by a controller and its stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PagingPlan {
    /// Whether stores create swap files and register pages for eviction.
    pub enabled: bool,
    /// Page size exponent.
    pub page_shift: u32,
    /// Page size in bytes.
    pub page_size: usize,
    /// Memory ceiling the budget was derived from.
    pub memory_ceiling: u64,
    /// Maximum resident pages across all stores of one controller.
    pub resident_budget: usize,
    /// Minimum pages released per housekeeping pass.
    pub batch_size: usize,
    /// Materializations between housekeeping passes.
    pub check_interval: usize,
    /// Directory receiving swap files.
    pub swap_dir: PathBuf,
}

fn host_memory_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}
