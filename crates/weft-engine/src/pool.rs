//! Page pool
//!
//! Per-engine (single-threaded) reuse of loaded pages. A page returns to
//! the pool only when its dirty count is zero — a render that aborted
//! mid-flight leaves the count raised and the instance is discarded rather
//! than handed to another request. Template invalidation bumps a generation
//! counter; stale pooled pages are discarded at checkout.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use weft_page::Page;

struct PooledPage {
    page: Page,
    generation: u64,
}

pub struct PagePool {
    free: RefCell<HashMap<(String, String), Vec<PooledPage>>>,
    max_per_key: usize,
    generation: Arc<AtomicU64>,
}

impl PagePool {
    pub fn new(max_per_key: usize) -> Self {
        Self {
            free: RefCell::new(HashMap::new()),
            max_per_key,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared generation counter; bumping it retires every pooled page.
    pub fn generation_handle(&self) -> Arc<AtomicU64> {
        self.generation.clone()
    }

    pub fn checkout(&self, name: &str, locale: &str) -> Option<Page> {
        let key = (name.to_lowercase(), locale.to_string());
        let current = self.generation.load(Ordering::SeqCst);
        let mut free = self.free.borrow_mut();
        let pages = free.get_mut(&key)?;
        while let Some(pooled) = pages.pop() {
            if pooled.generation != current {
                tracing::debug!(page = name, "discarding stale pooled page");
                continue;
            }
            pooled.page.attached();
            return Some(pooled.page);
        }
        None
    }

    /// Return a page to the pool; dirty pages are discarded.
    pub fn release(&self, page: Page) {
        if page.dirty_count() != 0 {
            tracing::warn!(
                page = page.name(),
                dirty = page.dirty_count(),
                "discarding page that did not finish rendering"
            );
            return;
        }
        page.detached();
        let key = (page.name().to_lowercase(), page.locale().to_string());
        let mut free = self.free.borrow_mut();
        let pages = free.entry(key).or_default();
        if pages.len() >= self.max_per_key {
            return;
        }
        pages.push(PooledPage {
            page,
            generation: self.generation.load(Ordering::SeqCst),
        });
    }
}

/// Checkout guard: hands the page back to the pool on all exit paths,
/// including unwinds out of a failed render.
pub struct CheckedOutPage<'a> {
    pool: &'a PagePool,
    page: Option<Page>,
}

impl<'a> CheckedOutPage<'a> {
    pub fn new(pool: &'a PagePool, page: Page) -> Self {
        Self {
            pool,
            page: Some(page),
        }
    }

    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("page is held until drop")
    }
}

impl Drop for CheckedOutPage<'_> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.pool.release(page);
        }
    }
}
