#![allow(missing_docs)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::thread;

use parking_lot::Mutex;
use swaparena::primitives::io::FileIo;
use swaparena::primitives::pager::{EvictionController, PagedByteStore, PagingOptions};
use swaparena::types::{ArenaError, PageId};
use swaparena::{ArenaOptions, ObjectArena};
use tempfile::{tempdir, TempDir};
use tracing_subscriber::EnvFilter;

const PAGE: usize = 256;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("swaparena=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn controller(dir: &TempDir, budget: usize, interval: usize) -> Arc<EvictionController> {
    init_tracing();
    EvictionController::new(
        PagingOptions::default()
            .page_shift(8)
            .resident_page_budget(budget)
            .batch_size(1)
            .check_interval(interval)
            .swap_dir(dir.path()),
    )
    .expect("controller")
}

fn fill_pages(store: &mut PagedByteStore, pages: usize, salt: u8) {
    for i in 0..pages {
        let byte = (i as u8).wrapping_add(salt);
        store.append(&[byte; PAGE]).expect("append page");
    }
}

fn check_pages(store: &PagedByteStore, pages: usize, salt: u8) {
    for i in 0..pages {
        let expected = (i as u8).wrapping_add(salt);
        let bytes = store.to_vec((i * PAGE) as u64, PAGE).expect("read page");
        assert!(
            bytes.iter().all(|&b| b == expected),
            "page {i} lost its contents"
        );
    }
}

/// In-memory swap file whose reads and writes can be made to fail.
#[derive(Default)]
struct FlakyState {
    bytes: Mutex<Vec<u8>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    // Reads at or past this swap offset fail; zero leaves them alone.
    fail_reads_from: AtomicU64,
}

struct FlakyIo(Arc<FlakyState>);

impl FileIo for FlakyIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> io::Result<()> {
        let floor = self.0.fail_reads_from.load(Ordering::SeqCst);
        if self.0.fail_reads.load(Ordering::SeqCst) || (floor > 0 && off >= floor) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        let bytes = self.0.bytes.lock();
        let start = off as usize;
        let end = start + dst.len();
        if end > bytes.len() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        dst.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn write_at(&self, off: u64, src: &[u8]) -> io::Result<()> {
        if self.0.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let mut bytes = self.0.bytes.lock();
        let start = off as usize;
        let end = start + src.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(src);
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.0.bytes.lock().len() as u64)
    }
}

#[test]
fn forced_housekeeping_reaches_budget_without_data_loss() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 4, 1_000_000);
    let mut store = PagedByteStore::new(&controller);
    fill_pages(&mut store, 64, 0);
    assert_eq!(store.stats().resident_pages, 64);

    let report = controller.run_housekeeping();
    assert_eq!(report.resident_before, 64);
    assert_eq!(report.evicted, 60);
    assert_eq!(report.resident_after, 4);
    assert_eq!(controller.resident_pages(), 4);

    let stats = store.stats();
    assert_eq!(stats.evictions, 60);
    assert_eq!(stats.flushes, 60);
    assert_eq!(stats.swap_bytes, (60 * PAGE) as u64);

    check_pages(&store, 64, 0);
    assert_eq!(store.stats().reloads, 60);
}

#[test]
fn least_recently_touched_pages_go_first() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 2, 1_000_000);
    let mut store = PagedByteStore::new(&controller);
    fill_pages(&mut store, 8, 0);
    // touch the oldest page so it survives
    store.get(0).unwrap();
    controller.run_housekeeping();
    let before = store.stats().reloads;
    store.get(0).unwrap();
    store.get((7 * PAGE) as u64).unwrap();
    assert_eq!(store.stats().reloads, before);
    store.get(PAGE as u64).unwrap();
    assert_eq!(store.stats().reloads, before + 1);
}

#[test]
fn automatic_housekeeping_bounds_residency() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 8, 2);
    let mut store = PagedByteStore::new(&controller);
    fill_pages(&mut store, 200, 3);
    assert!(controller.stats().passes > 0);
    assert!(controller.resident_pages() <= 8 + 2);
    controller.run_housekeeping();
    assert!(controller.resident_pages() <= 8);
    check_pages(&store, 200, 3);
}

#[test]
fn rewritten_pages_keep_their_swap_slot() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 1, 1_000_000);
    let mut store = PagedByteStore::new(&controller);
    fill_pages(&mut store, 4, 0);
    controller.run_housekeeping();
    let swap_bytes = store.stats().swap_bytes;

    for round in 1..=3u8 {
        for i in 0..4 {
            store.set((i * PAGE + 17) as u64, round).unwrap();
        }
        controller.run_housekeeping();
        for i in 0..4 {
            assert_eq!(store.get((i * PAGE + 17) as u64).unwrap(), round);
            assert_eq!(store.get((i * PAGE) as u64).unwrap(), i as u8);
        }
    }
    assert_eq!(store.stats().swap_bytes, swap_bytes);
}

#[test]
fn clean_pages_are_released_without_rewrite() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 1, 1_000_000);
    let mut store = PagedByteStore::new(&controller);
    fill_pages(&mut store, 4, 0);
    controller.run_housekeeping();
    let flushes = store.stats().flushes;
    check_pages(&store, 4, 0);
    controller.run_housekeeping();
    assert_eq!(store.stats().flushes, flushes);
    assert!(controller.stats().pages_evicted > flushes);
}

#[test]
fn flush_failure_keeps_page_resident_until_retry() {
    init_tracing();
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 1, 1_000_000);
    let state = Arc::new(FlakyState::default());
    let mut store = PagedByteStore::with_swap_io(&controller, Box::new(FlakyIo(state.clone())));
    fill_pages(&mut store, 4, 9);

    state.fail_writes.store(true, Ordering::SeqCst);
    let report = controller.run_housekeeping();
    assert_eq!(report.evicted, 0);
    assert!(report.flush_failures >= 3);
    assert_eq!(store.stats().resident_pages, 4);
    assert!(controller.stats().flush_failures >= 3);
    check_pages(&store, 4, 9);

    state.fail_writes.store(false, Ordering::SeqCst);
    controller.run_housekeeping();
    assert_eq!(store.stats().resident_pages, 1);
    check_pages(&store, 4, 9);
}

#[test]
fn reload_failure_is_reported_and_recoverable() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 1, 1_000_000);
    let state = Arc::new(FlakyState::default());
    let mut store = PagedByteStore::with_swap_io(&controller, Box::new(FlakyIo(state.clone())));
    fill_pages(&mut store, 4, 0);
    controller.run_housekeeping();

    state.fail_reads.store(true, Ordering::SeqCst);
    match store.get(0) {
        Err(ArenaError::PageReloadFailure { page, .. }) => assert_eq!(page, PageId(0)),
        other => panic!("expected reload failure, got {other:?}"),
    }
    state.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(store.get(0).unwrap(), 0);
}

/// Two-page store whose second page cannot be reloaded, after an append
/// that wrote into the first page and then failed on the second.
fn store_after_failed_append(dir: &TempDir) -> (Arc<FlakyState>, PagedByteStore) {
    init_tracing();
    let controller = EvictionController::new(
        PagingOptions::default()
            .page_shift(8)
            .resident_page_budget(1)
            .batch_size(100)
            .check_interval(1)
            .swap_dir(dir.path()),
    )
    .expect("controller");
    let state = Arc::new(FlakyState::default());
    let mut store = PagedByteStore::with_swap_io(&controller, Box::new(FlakyIo(state.clone())));
    store.append(&[3u8; 100]).expect("first append");
    state.fail_reads_from.store(PAGE as u64, Ordering::SeqCst);

    let err = store.append(&[7u8; 400]).unwrap_err();
    assert!(
        matches!(err, ArenaError::PageReloadFailure { page: PageId(1), .. }),
        "{err:?}"
    );
    assert_eq!(store.size(), 100);
    assert_eq!(store.capacity(), 2 * PAGE as u64);
    (state, store)
}

#[test]
fn allocation_after_failed_append_is_zeroed() {
    let dir = tempdir().unwrap();
    let (state, mut store) = store_after_failed_append(&dir);

    let at = store.allocate(100).unwrap();
    assert_eq!(at, 100);
    assert!(store.to_vec(100, 100).unwrap().iter().all(|&b| b == 0));
    assert!(store.to_vec(0, 100).unwrap().iter().all(|&b| b == 3));

    state.fail_reads_from.store(0, Ordering::SeqCst);
    let at = store.allocate(400).unwrap();
    assert_eq!(at, 200);
    store.controller().run_housekeeping();
    assert!(store.to_vec(200, 400).unwrap().iter().all(|&b| b == 0));
    assert!(store.to_vec(0, 100).unwrap().iter().all(|&b| b == 3));
}

#[test]
fn trim_releases_pages_left_by_failed_append() {
    let dir = tempdir().unwrap();
    let (state, mut store) = store_after_failed_append(&dir);
    state.fail_reads_from.store(0, Ordering::SeqCst);

    store.trim_to_size();
    assert_eq!(store.capacity(), PAGE as u64);
    assert!(store.capacity() >= store.size());
    assert_eq!(store.stats().pages, 1);
    assert!(store.to_vec(0, 100).unwrap().iter().all(|&b| b == 3));

    let controller = Arc::clone(store.controller());
    let at = store.append(&[9u8; 300]).unwrap();
    assert_eq!(at, 100);
    controller.run_housekeeping();
    assert!(controller.resident_pages() <= 1);
    assert!(controller.stats().registry_len <= store.stats().pages);
    assert!(store.to_vec(0, 100).unwrap().iter().all(|&b| b == 3));
    assert!(store.to_vec(100, 300).unwrap().iter().all(|&b| b == 9));
    assert_eq!(store.stats().pages, 2);
}

#[test]
fn explicit_swap_io_is_ignored_when_paging_is_disabled() {
    init_tracing();
    let controller = EvictionController::new(
        PagingOptions::in_memory()
            .page_shift(8)
            .resident_page_budget(1),
    )
    .expect("controller");
    let state = Arc::new(FlakyState::default());
    let mut store = PagedByteStore::with_swap_io(&controller, Box::new(FlakyIo(state.clone())));
    assert!(!store.is_paging());
    fill_pages(&mut store, 6, 1);
    controller.run_housekeeping();
    assert_eq!(store.stats().resident_pages, 6);
    assert_eq!(controller.stats().registered_stores, 0);
    assert!(state.bytes.lock().is_empty());
    check_pages(&store, 6, 1);
}

#[test]
fn stores_share_one_budget() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 4, 1_000_000);
    let mut a = PagedByteStore::new(&controller);
    let mut b = PagedByteStore::new(&controller);
    fill_pages(&mut a, 16, 1);
    fill_pages(&mut b, 16, 2);
    assert_eq!(controller.stats().registered_stores, 2);

    controller.run_housekeeping();
    assert_eq!(controller.resident_pages(), 4);
    // b was written last, so a lost all of its pages
    assert_eq!(a.stats().resident_pages, 0);
    check_pages(&a, 16, 1);
    check_pages(&b, 16, 2);

    drop(a);
    let stats = controller.stats();
    assert_eq!(stats.registered_stores, 1);
    controller.run_housekeeping();
    check_pages(&b, 16, 2);
}

#[test]
fn arenas_on_separate_threads_share_a_controller() {
    let dir = tempdir().unwrap();
    let controller = controller(&dir, 16, 4);
    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let mut arena =
                    ObjectArena::new(&controller, ArenaOptions::default()).expect("arena");
                let mut handles = Vec::new();
                for i in 0..2_000u64 {
                    let rec = arena.new_object(16).unwrap();
                    arena.set_integer(rec, 0, 8, worker << 32 | i).unwrap();
                    handles.push(rec);
                }
                for (i, rec) in handles.iter().enumerate() {
                    assert_eq!(arena.get_integer(*rec, 0, 8).unwrap(), worker << 32 | i as u64);
                }
                arena.stats().store.evictions
            })
        })
        .collect();
    let evictions: u64 = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert!(evictions > 0);
    assert_eq!(controller.stats().registered_stores, 0);
}

#[test]
fn disabled_paging_keeps_everything_resident() {
    let controller = EvictionController::new(
        PagingOptions::default()
            .page_shift(8)
            .memory_threshold_percent(0)
            .resident_page_budget(1),
    )
    .unwrap();
    assert!(!controller.plan().enabled);
    let mut store = PagedByteStore::new(&controller);
    fill_pages(&mut store, 16, 0);
    controller.run_housekeeping();
    assert_eq!(store.stats().resident_pages, 16);
    assert!(store.swap_path().is_none());
}
