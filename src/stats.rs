// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-class release/allocation counters and the periodic adaptation
//! pass that re-derives the pool's default buffer size.
//!
//! Grounded on `examples/original_source/buffer.go`'s `Stats.adapt`.
//! That source computes a percentile-weighted `max_cap` and then
//! discards it, storing the static ceiling instead; this version
//! publishes the computed value, the evident intent behind the
//! original pass. See `DESIGN.md` for the reasoning.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::table::{self, ADAPT_PERCENTILE, ADAPT_THRESHOLD, MAX_CAPACITY, MIN_CAPACITY, NUM_CLASSES};

#[derive(Default)]
struct ClassStat {
    allocs: AtomicU64,
    releases: AtomicU64,
}

/// Statistics and adaptation state for one `Pool`.
pub struct Stats {
    per_class: [ClassStat; NUM_CLASSES],
    total_since_adapt: AtomicU64,
    default_size: AtomicUsize,
    max_class_size: AtomicUsize,
    adapt_guard: AtomicBool,
    auto_enabled: AtomicBool,
    adaptations_run: AtomicU64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self {
            per_class: std::array::from_fn(|_| ClassStat::default()),
            total_since_adapt: AtomicU64::new(0),
            default_size: AtomicUsize::new(MIN_CAPACITY),
            max_class_size: AtomicUsize::new(MAX_CAPACITY),
            adapt_guard: AtomicBool::new(false),
            auto_enabled: AtomicBool::new(true),
            adaptations_run: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_alloc(&self, class: usize) {
        self.per_class[class].allocs.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a release against `class` and returns the aggregate
    /// release count observed since the last adaptation pass (or since
    /// pool creation, if none has run yet).
    pub(crate) fn record_release(&self, class: usize) -> u64 {
        self.per_class[class]
            .releases
            .fetch_add(1, Ordering::Relaxed);
        self.total_since_adapt.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn auto_enabled(&self) -> bool {
        self.auto_enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn default_size(&self) -> usize {
        self.default_size.load(Ordering::Relaxed)
    }

    pub(crate) fn max_class_size(&self) -> usize {
        self.max_class_size.load(Ordering::Relaxed)
    }

    /// Trigger an adaptation pass once `total_since_adapt` has pushed
    /// *past* `AdaptThreshold` — the release that lands exactly on the
    /// threshold does not yet trigger; only the next one, which pushes
    /// the count strictly above it, does. Gated by `adapt_guard` so
    /// only one pass runs at a time; a loser simply returns without
    /// doing any work.
    pub(crate) fn maybe_adapt(&self, total_since_last_release: u64) {
        if total_since_last_release <= ADAPT_THRESHOLD {
            return;
        }
        if self
            .adapt_guard
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.total_since_adapt.store(0, Ordering::Relaxed);
        log::debug!("adaptation pass starting");

        let mut snapshots = [0u64; NUM_CLASSES];
        let mut total: u64 = 0;
        for (i, snapshot) in snapshots.iter_mut().enumerate() {
            let r = self.per_class[i].releases.swap(0, Ordering::AcqRel);
            *snapshot = r;
            total += r;
        }

        let max_cap = if total == 0 {
            MIN_CAPACITY
        } else {
            let target = total as f64 * ADAPT_PERCENTILE;
            let mut covered = 0.0f64;
            let mut cap = table::capacity(0);
            for (i, &r) in snapshots.iter().enumerate() {
                covered += r as f64;
                cap = table::capacity(i);
                if covered >= target {
                    break;
                }
            }
            cap
        };

        // The original Go adaptation pass stores the static ceiling
        // here instead of `max_cap`; this stores the computed
        // percentile capacity, per DESIGN.md.
        self.default_size.store(MIN_CAPACITY, Ordering::Relaxed);
        self.max_class_size.store(max_cap, Ordering::Relaxed);
        self.adaptations_run.fetch_add(1, Ordering::Relaxed);
        log::debug!("adaptation pass finished, max_class_size={max_cap}");

        self.adapt_guard.store(false, Ordering::Release);
    }

    #[cfg(test)]
    fn adaptations_run(&self) -> u64 {
        self.adaptations_run.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn releases_for_class(&self, class: usize) -> u64 {
        self.per_class[class].releases.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn allocs_for_class(&self, class: usize) -> u64 {
        self.per_class[class].allocs.load(Ordering::Relaxed)
    }
}
