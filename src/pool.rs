// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public pool API: routes acquire/release by size class, allocates
//! on miss, and owns the optional statistics/adaptation engine.
//!
//! Grounded on `examples/original_source/lfpool.go`'s `BuffPool`
//! (`Get`/`Release`/`AutoGet`/`AutoRelease`) and on the ownership style
//! of `crates/hdds/src/core/rt/slabpool.rs`'s `SlabPool` — a single
//! struct holding one sub-pool per size class, with `Arc<Pool>` as the
//! expected sharing mechanism across threads (mirroring
//! `core::rt::{init_slab_pool, get_slab_pool}`'s `Arc<SlabPool>`
//! convention), except this crate never installs a process-wide
//! singleton: every caller builds its own.

use std::sync::Arc;

use crate::bucket::Bucket;
use crate::buffer::Buffer;
use crate::error::PoolError;
use crate::handle::Handle;
use crate::stats::Stats;
use crate::table::{self, MAX_CAPACITY, MIN_CAPACITY, NUM_CLASSES};

/// A size-classed, lock-free pool of reusable byte buffers.
///
/// Cheap to construct, expensive to construct *many* of — share one
/// instance across threads behind an `Arc` when buffer handles
/// ([`Handle`]) are needed; raw [`Pool::acquire`]/[`Pool::release`]
/// work against a plain `&Pool`.
pub struct Pool {
    buckets: [Bucket; NUM_CLASSES],
    stats: Option<Stats>,
}

impl Pool {
    /// Build a pool with statistics and adaptation disabled.
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| Bucket::new()),
            stats: None,
        }
    }

    /// Build a pool with statistics enabled and adaptation armed.
    pub fn with_stats() -> Self {
        Self {
            buckets: std::array::from_fn(|_| Bucket::new()),
            stats: Some(Stats::new()),
        }
    }

    fn acquire_from_class(&self, class: usize, len: usize) -> Buffer {
        match self.buckets[class].claim() {
            Some(vec) => Buffer::new(vec, len),
            None => {
                if let Some(stats) = &self.stats {
                    stats.record_alloc(class);
                }
                let cap = table::capacity(class);
                log::trace!("pool: allocation miss for class {class}, allocating capacity {cap}");
                Buffer::new(vec![0u8; cap], len)
            }
        }
    }

    /// Acquire a buffer of at least `n` bytes. Without a capacity
    /// hint the returned buffer's length equals its full class
    /// capacity.
    pub fn acquire(&self, n: usize) -> Buffer {
        let r = table::clamp_capacity(n.max(MIN_CAPACITY));
        let class = table::class_of(r);
        let cap = table::capacity(class);
        self.acquire_from_class(class, cap)
    }

    /// Acquire a buffer sized by `cap_hint`'s class, with an explicit
    /// committed length of `n`.
    ///
    /// # Panics
    /// Panics if `n > cap_hint` — that's a programmer error, not a
    /// recoverable condition.
    pub fn acquire_len_cap(&self, n: usize, cap_hint: usize) -> Buffer {
        assert!(
            n <= cap_hint,
            "lfbufpool: acquire_len_cap called with len {n} > cap_hint {cap_hint}"
        );
        let r = table::clamp_capacity(cap_hint.max(MIN_CAPACITY));
        let class = table::class_of(r);
        let len = n.min(r);
        self.acquire_from_class(class, len)
    }

    /// Release `buf` back to the pool. Buffers whose capacity falls
    /// outside `[MIN_CAPACITY, MAX_CAPACITY]` are silently dropped;
    /// release is a hint, not an obligation the caller must satisfy.
    pub fn release(&self, buf: Buffer) {
        self.release_inner(buf, false);
    }

    /// Like [`Pool::release`], but additionally drops the buffer
    /// instead of publishing it if its capacity exceeds the currently
    /// tracked `max_class_size`, shedding oversized buffers once
    /// adaptation has narrowed the pool's working set.
    pub(crate) fn auto_release(&self, buf: Buffer) {
        self.release_inner(buf, true);
    }

    fn release_inner(&self, buf: Buffer, shed_oversized: bool) {
        let capacity = buf.capacity();
        if capacity < MIN_CAPACITY || capacity > MAX_CAPACITY {
            log::trace!("pool: release of out-of-range capacity {capacity}, dropping");
            return;
        }

        let class = table::class_of(capacity);

        // Stats bookkeeping and the adaptation threshold check happen
        // unconditionally, before the oversized-shed decision below —
        // shedding only affects whether the buffer is reinserted into
        // the chain, never whether the release is counted.
        if let Some(stats) = &self.stats {
            let total = stats.record_release(class);
            stats.maybe_adapt(total);
        }

        if shed_oversized {
            if let Some(stats) = &self.stats {
                if capacity > stats.max_class_size() {
                    log::trace!("pool: auto_release dropping oversized buffer ({capacity} bytes)");
                    return;
                }
            }
        }

        let exact_cap = table::capacity(class);
        let mut vec = buf.into_raw();
        if capacity < exact_cap {
            // Only reachable if caller-driven growth left the buffer
            // short of its class's exact capacity.
            vec = vec![0u8; exact_cap];
        }
        self.buckets[class].publish(vec);
    }

    /// Acquire a buffer sized at the current adaptive default.
    ///
    /// # Errors
    /// Returns [`PoolError::NotSupported`] if this pool was built
    /// without statistics (`Pool::new`).
    pub fn auto_acquire(&self) -> Result<Buffer, PoolError> {
        match &self.stats {
            Some(stats) if stats.auto_enabled() => Ok(self.acquire(stats.default_size())),
            _ => Err(PoolError::NotSupported),
        }
    }

    /// Acquire a scoped [`Handle`] wrapping a buffer of at least `n`
    /// bytes. Dropping (or explicitly releasing) the handle returns
    /// the buffer via [`Pool::release`].
    pub fn acquire_buffer(self: &Arc<Self>, n: usize) -> Handle {
        let buf = self.acquire(n);
        Handle::new(buf, Arc::clone(self), false)
    }

    /// Like [`Pool::acquire_buffer`], but sized at the current
    /// adaptive default and released via [`Pool::auto_release`].
    ///
    /// # Errors
    /// Returns [`PoolError::NotSupported`] if this pool was built
    /// without statistics.
    pub fn auto_acquire_buffer(self: &Arc<Self>) -> Result<Handle, PoolError> {
        let buf = self.auto_acquire()?;
        Ok(Handle::new(buf, Arc::clone(self), true))
    }

    /// Explicitly release `handle`'s buffer via [`Pool::release`],
    /// regardless of how the handle was acquired.
    pub fn release_buffer(&self, mut handle: Handle) {
        if let Some(buf) = handle.take_buffer() {
            self.release(buf);
        }
    }

    /// Explicitly release `handle`'s buffer via [`Pool::auto_release`],
    /// regardless of how the handle was acquired.
    pub fn auto_release_buffer(&self, mut handle: Handle) {
        if let Some(buf) = handle.take_buffer() {
            self.auto_release(buf);
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
