//! Cumulative allocation accounting.
//!
//! jemalloc reports live bytes but not the running total of bytes ever
//! allocated. `CountingAllocator` wraps the global allocator and adds every
//! successful allocation to an `AllocationCounter`.
//!
//! ```ignore
//! use memwatch_core::collector::CountingAllocator;
//! use tikv_jemallocator::Jemalloc;
//!
//! #[global_allocator]
//! static GLOBAL: CountingAllocator<Jemalloc> = CountingAllocator::new(Jemalloc);
//! ```

use std::alloc::{GlobalAlloc, Layout};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter of allocated bytes.
#[derive(Debug, Default)]
pub struct AllocationCounter {
    total: AtomicU64,
}

impl AllocationCounter {
    pub const fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record(&self, bytes: usize) {
        self.total.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Bytes recorded so far.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Global allocator wrapper that records cumulative allocated bytes.
///
/// Reallocations record only growth.
pub struct CountingAllocator<A> {
    inner: A,
    counter: AllocationCounter,
}

impl<A> CountingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            counter: AllocationCounter::new(),
        }
    }

    pub fn counter(&self) -> &AllocationCounter {
        &self.counter
    }
}

// SAFETY: every call is forwarded unchanged to `inner`; the counter does not
// allocate.
unsafe impl<A: GlobalAlloc> GlobalAlloc for CountingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            self.counter.record(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            self.counter.record(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() && new_size > layout.size() {
            self.counter.record(new_size - layout.size());
        }
        new_ptr
    }
}
