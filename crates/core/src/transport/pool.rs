//! Free-list of request/response scratch buffers.
//!
//! Every `send` borrows one [`Scratch`] for its whole retry loop. The
//! [`PooledScratch`] guard hands it back on drop, so error paths, timeouts
//! (the future is dropped mid-flight) and panics all release it.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use reqwest::header::HeaderMap;

/// Response buffers that grew past this are dropped instead of pooled.
const MAX_RETAINED_BODY: usize = 1024 * 1024;

/// Header set and response body buffer for one call.
#[derive(Debug, Default)]
pub struct Scratch {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Scratch {
    fn reset(&mut self) {
        self.headers.clear();
        self.body.clear();
    }
}

#[derive(Debug)]
pub struct ScratchPool {
    free: Mutex<Vec<Scratch>>,
    max_idle: usize,
    allocated: AtomicUsize,
}

impl ScratchPool {
    /// Pool keeping at most `max_idle` released buffers.
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            allocated: AtomicUsize::new(0),
        }
    }

    /// Take a reset scratch pair, allocating only when the free-list is empty.
    pub fn acquire(&self) -> PooledScratch<'_> {
        let reused = self.free.lock().pop();
        let mut scratch = match reused {
            Some(scratch) => scratch,
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Scratch::default()
            }
        };
        scratch.reset();
        PooledScratch {
            pool: self,
            scratch: Some(scratch),
        }
    }

    fn release(&self, scratch: Scratch) {
        if scratch.body.capacity() > MAX_RETAINED_BODY {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(scratch);
        }
    }

    /// Buffers currently waiting in the free-list.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Buffers ever allocated by this pool.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

/// Scoped borrow of a [`Scratch`]; returned to its pool on drop.
#[derive(Debug)]
pub struct PooledScratch<'a> {
    pool: &'a ScratchPool,
    scratch: Option<Scratch>,
}

impl Deref for PooledScratch<'_> {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        // Only `drop` takes the value out.
        self.scratch.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledScratch<'_> {
    fn deref_mut(&mut self) -> &mut Scratch {
        self.scratch.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledScratch<'_> {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            self.pool.release(scratch);
        }
    }
}
