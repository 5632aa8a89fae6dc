// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Head of a slot-block chain for one size class.
//!
//! Grounded on `examples/original_source/lfpool.go`'s `bpnode`/`detach`
//! and `lfslice.go`'s `Insert`/`Get` (chain-extension-on-overflow,
//! traverse-without-compact-on-pop).

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::slot_block::{
    free_chain, free_unlinked_marked_ptr, marked_ptr_target, new_marked_ptr, SlotBlock,
};

pub(crate) struct Bucket {
    head: AtomicPtr<SlotBlock>,
}

/// Owns a detached chain (e.g. from `Bucket::detach`) and frees it,
/// along with every buffer still resident in it, on drop.
///
/// Reserved for a future pruning/reclamation pass; not on any hot path.
pub(crate) struct DetachedChain(*mut SlotBlock);

impl Drop for DetachedChain {
    fn drop(&mut self) {
        free_chain(self.0);
    }
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(SlotBlock::boxed()),
        }
    }

    /// Publish `buf` into the chain. Retries against successive blocks
    /// on overflow, extending the chain (never unlinking a node) when
    /// no successor exists yet.
    pub(crate) fn publish(&self, buf: Vec<u8>) {
        let mut node = self.head.load(Ordering::Acquire);
        let mut buf = buf;
        loop {
            // SAFETY: `node` always points at a live block owned by this
            // bucket's chain; blocks are never freed while reachable.
            let block = unsafe { &*node };
            match block.try_push(buf) {
                Ok(()) => return,
                Err(returned) => {
                    buf = returned;
                    let existing = block.next_marked();
                    if existing.is_null() {
                        let new_block = SlotBlock::boxed();
                        let candidate = new_marked_ptr(new_block);
                        match block.try_link_next(candidate) {
                            Ok(_) => {
                                log::debug!("bucket chain extended with a new slot block");
                                node = new_block;
                            }
                            Err(winner) => {
                                // Someone else installed a successor first;
                                // free our speculative allocation and
                                // follow the winner's link instead.
                                free_chain(new_block);
                                // SAFETY: candidate was never linked into any
                                // chain, so we still hold sole ownership.
                                unsafe { free_unlinked_marked_ptr(candidate) };
                                node = marked_ptr_target(winner);
                            }
                        }
                    } else {
                        node = marked_ptr_target(existing);
                    }
                }
            }
        }
    }

    /// Claim a buffer from the chain, traversing (but never
    /// compacting) past exhausted blocks. Returns `None` once the
    /// whole chain is empty.
    pub(crate) fn claim(&self) -> Option<Vec<u8>> {
        let mut node = self.head.load(Ordering::Acquire);
        loop {
            // SAFETY: see `publish`.
            let block = unsafe { &*node };
            if let Some(buf) = block.try_pop() {
                return Some(buf);
            }
            let next = block.next_marked();
            if next.is_null() {
                return None;
            }
            node = marked_ptr_target(next);
        }
    }

    /// Atomically detach the whole chain, replacing `head` with a
    /// fresh empty block, and return the old chain for bulk recycling.
    #[allow(dead_code)]
    pub(crate) fn detach(&self) -> DetachedChain {
        let fresh = SlotBlock::boxed();
        let old = self.head.swap(fresh, Ordering::AcqRel);
        DetachedChain(old)
    }
}

impl Drop for Bucket {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        *self.head.get_mut() = ptr::null_mut();
        free_chain(head);
    }
}
