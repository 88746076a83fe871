/// One fixed-size page of a [`super::PagedByteStore`].
///
/// `buf` is `None` while the page is swapped out; a swapped-out page always
/// carries a `swap_slot`, because a page is only released once clean and a
/// page that never reached the swap file is created dirty.
pub(crate) struct Page {
    pub buf: Option<Box<[u8]>>,
    pub dirty: bool,
    pub swap_slot: Option<u64>,
    pub recency: u64,
}

impl Page {
    pub fn new(page_size: usize, recency: u64) -> Self {
        Self {
            buf: Some(vec![0u8; page_size].into_boxed_slice()),
            dirty: true,
            swap_slot: None,
            recency,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.buf.is_some()
    }

    /// Lower values are evicted first; absent pages cannot be evicted again.
    pub fn keep_priority(&self) -> u64 {
        if self.is_resident() {
            self.recency
        } else {
            u64::MAX
        }
    }
}
