use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::directory::{EvictOutcome, SharedDirectory};
use super::options::{PagingOptions, PagingPlan};
use crate::types::{PageId, Result, StoreId};

/// Registry entry naming one page of one store. It never owns the page.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct PageKey {
    store: StoreId,
    page: PageId,
}

/// Counters accumulated by an [`EvictionController`].
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct ControllerStats {
    /// Housekeeping passes that evaluated the registry.
    pub passes: u64,
    /// Buffers released across all stores.
    pub pages_evicted: u64,
    /// Bytes written to swap files by eviction.
    pub bytes_flushed: u64,
    /// Victims kept resident because their flush failed.
    pub flush_failures: u64,
    /// Current registry length, stale entries included.
    pub registry_len: u64,
    /// Stores currently attached.
    pub registered_stores: u64,
    /// Configured resident page budget.
    pub resident_budget: u64,
}

impl fmt::Display for ControllerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "passes={} evicted={} flushed_bytes={} flush_failures={} registry={} stores={} budget={}",
            self.passes,
            self.pages_evicted,
            self.bytes_flushed,
            self.flush_failures,
            self.registry_len,
            self.registered_stores,
            self.resident_budget
        )
    }
}

/// Outcome of a single housekeeping pass.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Live resident pages seen before eviction.
    pub resident_before: usize,
    /// Live resident pages left after the pass.
    pub resident_after: usize,
    /// Buffers released during the pass.
    pub evicted: usize,
    /// Victims whose flush failed.
    pub flush_failures: usize,
}

struct ControllerState {
    stores: FxHashMap<StoreId, SharedDirectory>,
    registry: Vec<PageKey>,
    notifications: u64,
    stats: ControllerStats,
}

/// Tracks resident pages of every attached store and caps them to a budget.
///
/// One controller is created by the application and shared (through an
/// `Arc`) by every store that should draw from the same memory budget. The
/// registry only holds `(store, page)` keys; stores hand their directory over
/// at construction and take it back explicitly when dropped.
pub struct EvictionController {
    plan: PagingPlan,
    clock: AtomicU64,
    next_store: AtomicU64,
    state: Mutex<ControllerState>,
}

impl EvictionController {
    /// Creates a controller from paging options.
    pub fn new(options: PagingOptions) -> Result<Arc<Self>> {
        let plan = options.resolve()?;
        debug!(
            enabled = plan.enabled,
            page_size = plan.page_size,
            budget = plan.resident_budget,
            batch = plan.batch_size,
            interval = plan.check_interval,
            "swaparena.pager.controller_created"
        );
        Ok(Arc::new(Self {
            plan,
            clock: AtomicU64::new(0),
            next_store: AtomicU64::new(1),
            state: Mutex::new(ControllerState {
                stores: FxHashMap::default(),
                registry: Vec::new(),
                notifications: 0,
                stats: ControllerStats::default(),
            }),
        }))
    }

    /// The resolved configuration.
    pub fn plan(&self) -> &PagingPlan {
        &self.plan
    }

    /// Advances the shared recency counter.
    pub(crate) fn tick(&self) -> u64 {
        self.clock.fetch_add(1, AtomicOrdering::Relaxed) + 1
    }

    pub(crate) fn allocate_store_id(&self) -> StoreId {
        StoreId(self.next_store.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub(crate) fn register(&self, id: StoreId, directory: SharedDirectory) {
        self.state.lock().stores.insert(id, directory);
    }

    /// Drops every registry entry of `id` and releases its directory.
    pub(crate) fn deregister(&self, id: StoreId) {
        let mut state = self.state.lock();
        state.stores.remove(&id);
        state.registry.retain(|key| key.store != id);
    }

    /// Records newly materialized pages and runs housekeeping on every
    /// `check_interval`-th materialization.
    pub(crate) fn note_resident(&self, store: StoreId, pages: &[PageId]) {
        if pages.is_empty() {
            return;
        }
        let interval = self.plan.check_interval as u64;
        let mut state = self.state.lock();
        let before = state.notifications / interval;
        state
            .registry
            .extend(pages.iter().map(|&page| PageKey { store, page }));
        state.notifications += pages.len() as u64;
        if state.notifications / interval != before {
            self.housekeeping(&mut state);
        }
    }

    /// Runs one housekeeping pass immediately.
    pub fn run_housekeeping(&self) -> HousekeepingReport {
        let mut state = self.state.lock();
        self.housekeeping(&mut state)
    }

    /// Resident pages across all attached stores.
    pub fn resident_pages(&self) -> usize {
        let state = self.state.lock();
        state
            .stores
            .values()
            .map(|dir| dir.lock().resident_count())
            .sum()
    }

    /// Returns a snapshot of controller statistics.
    pub fn stats(&self) -> ControllerStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.registry_len = state.registry.len() as u64;
        stats.registered_stores = state.stores.len() as u64;
        stats.resident_budget = self.plan.resident_budget as u64;
        stats
    }

    fn housekeeping(&self, state: &mut ControllerState) -> HousekeepingReport {
        let budget = self.plan.resident_budget;
        let mut report = HousekeepingReport::default();
        if state.registry.len() <= budget {
            report.resident_before = state.registry.len();
            report.resident_after = state.registry.len();
            return report;
        }
        state.stats.passes += 1;
        let mut candidates = Self::prune(state);
        report.resident_before = candidates.len();
        if candidates.len() <= budget {
            report.resident_after = candidates.len();
            return report;
        }

        let target = (candidates.len() - budget)
            .max(self.plan.batch_size)
            .min(candidates.len());
        candidates.sort_unstable_by_key(|(recency, _)| *recency);
        let threshold = candidates[target - 1].0;

        let mut victims: FxHashMap<StoreId, Vec<PageId>> = FxHashMap::default();
        for (_, key) in candidates.iter().take_while(|(recency, _)| *recency <= threshold) {
            victims.entry(key.store).or_default().push(key.page);
        }
        for (store, pages) in victims {
            let Some(dir) = state.stores.get(&store) else {
                continue;
            };
            let mut dir = dir.lock();
            for page in pages {
                match dir.evict(page) {
                    EvictOutcome::Released { flushed_bytes } => {
                        report.evicted += 1;
                        state.stats.pages_evicted += 1;
                        state.stats.bytes_flushed += flushed_bytes;
                    }
                    EvictOutcome::FlushFailed(err) => {
                        report.flush_failures += 1;
                        state.stats.flush_failures += 1;
                        warn!(
                            store = %store,
                            page = %page,
                            error = %err,
                            "swaparena.pager.flush_failed"
                        );
                    }
                    EvictOutcome::NotResident => {}
                }
            }
        }

        report.resident_after = Self::prune(state).len();
        debug!(
            evicted = report.evicted,
            resident = report.resident_after,
            resident_bytes = report.resident_after as u64 * self.plan.page_size as u64,
            budget,
            "swaparena.pager.housekeeping"
        );
        report
    }

    /// Removes stale and duplicate registry entries, returning the live
    /// entries with their recency.
    fn prune(state: &mut ControllerState) -> Vec<(u64, PageKey)> {
        let mut seen = FxHashSet::default();
        let mut live = Vec::with_capacity(state.registry.len());
        let stores = &state.stores;
        state.registry.retain(|key| {
            if !seen.insert(*key) {
                return false;
            }
            let recency = stores
                .get(&key.store)
                .and_then(|dir| dir.lock().resident_recency(key.page));
            match recency {
                Some(recency) => {
                    live.push((recency, *key));
                    true
                }
                None => false,
            }
        });
        live
    }
}

impl fmt::Debug for EvictionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvictionController")
            .field("plan", &self.plan)
            .field("clock", &self.clock.load(AtomicOrdering::Relaxed))
            .finish()
    }
}
