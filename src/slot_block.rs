// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity, lock-free slot array: the leaf node of a bucket's
//! chain.
//!
//! A slot-level CAS scan with a fill counter. All `unsafe` is kept to
//! one function at a time with a `SAFETY:` comment, never leaked past
//! the module boundary.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::table::SLOT_BLOCK_CAPACITY as K;

/// One cell's payload: an owned, heap-allocated byte buffer.
type Payload = Vec<u8>;

/// Fixed-size array of `K` buffer cells with a fill counter and a
/// forward link to a successor block.
///
/// Every buffer stored in a given `SlotBlock` has the same capacity
/// (enforced by the owning `Bucket`), which keeps the slot-level CAS
/// ABA-safe in practice: a stale pointer can only ever collide with a
/// same-size buffer.
pub(crate) struct SlotBlock {
    slots: [AtomicPtr<Payload>; K],
    count: AtomicUsize,
    next: AtomicPtr<MarkedPtr>,
}

/// `{target, mark}` header used for lock-free chain traversal.
///
/// `mark` carries no semantics in this revision; it is reserved for a
/// future pruning pass and is preserved verbatim under concurrent
/// modification (nothing here ever inspects it).
pub(crate) struct MarkedPtr {
    target: AtomicPtr<SlotBlock>,
    #[allow(dead_code)]
    mark: AtomicUsize,
}

impl MarkedPtr {
    fn new(target: *mut SlotBlock) -> Self {
        Self {
            target: AtomicPtr::new(target),
            mark: AtomicUsize::new(0),
        }
    }
}

impl SlotBlock {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            count: AtomicUsize::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn boxed() -> *mut SlotBlock {
        Box::into_raw(Box::new(SlotBlock::new()))
    }

    /// Advisory fill count; correctness never depends on it being
    /// exactly in sync with slot occupancy at any instant.
    pub(crate) fn length(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn next_marked(&self) -> *mut MarkedPtr {
        self.next.load(Ordering::Acquire)
    }

    /// Install `candidate` as this block's successor if none exists
    /// yet. Returns the winning marked-pointer header (ours if we won
    /// the race, the existing one otherwise) and, on loss, hands the
    /// loser's speculative allocation back for the caller to free.
    pub(crate) fn try_link_next(
        &self,
        candidate: *mut MarkedPtr,
    ) -> Result<*mut MarkedPtr, *mut MarkedPtr> {
        match self.next.compare_exchange(
            ptr::null_mut(),
            candidate,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(candidate),
            Err(existing) => Err(existing),
        }
    }

    /// Scan slots `0..K`, claim the first free cell via CAS, bump the
    /// fill counter. Returns the buffer back on failure (block full)
    /// so the caller can retry against the chain's next block without
    /// re-allocating.
    pub(crate) fn try_push(&self, buf: Payload) -> Result<(), Payload> {
        if self.count.load(Ordering::Acquire) >= K {
            return Err(buf);
        }
        let payload = Box::into_raw(Box::new(buf));
        loop {
            for slot in self.slots.iter() {
                if slot
                    .compare_exchange(
                        ptr::null_mut(),
                        payload,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    self.count.fetch_add(1, Ordering::AcqRel);
                    return Ok(());
                }
            }
            if self.count.load(Ordering::Acquire) >= K {
                // SAFETY: payload was boxed above and never installed into
                // any slot (every CAS attempt above failed), so we still
                // hold sole ownership and may reclaim it.
                let buf = unsafe { *Box::from_raw(payload) };
                return Err(buf);
            }
            std::hint::spin_loop();
        }
    }

    /// Scan slots `0..K`, claim the first occupied cell via a
    /// double-CAS membership check (self-CAS to confirm no racing
    /// popper already claimed it, then CAS to null), decrement the
    /// fill counter. Returns `None` once `count` reads zero.
    pub(crate) fn try_pop(&self) -> Option<Payload> {
        loop {
            if self.count.load(Ordering::Acquire) == 0 {
                return None;
            }
            for slot in self.slots.iter() {
                let current = slot.load(Ordering::Acquire);
                if current.is_null() {
                    continue;
                }
                // Membership check: reject if another popper already
                // changed this cell between our load and now.
                if slot
                    .compare_exchange(current, current, Ordering::AcqRel, Ordering::Relaxed)
                    .is_err()
                {
                    continue;
                }
                if slot
                    .compare_exchange(
                        current,
                        ptr::null_mut(),
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    self.count.fetch_sub(1, Ordering::AcqRel);
                    // SAFETY: we just won the CAS that retired this slot,
                    // so we are the sole owner of the payload it pointed to.
                    let buf = unsafe { Box::from_raw(current) };
                    return Some(*buf);
                }
            }
            if self.count.load(Ordering::Acquire) == 0 {
                return None;
            }
            std::thread::yield_now();
        }
    }
}

impl Drop for SlotBlock {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            let ptr = *slot.get_mut();
            if !ptr.is_null() {
                // SAFETY: no concurrent access is possible once a
                // SlotBlock is being dropped (we hold &mut self).
                drop(unsafe { Box::from_raw(ptr) });
            }
        }
    }
}

/// Free an entire chain starting at `head` (may be null). Iterative to
/// avoid recursive-drop stack depth proportional to chain length.
pub(crate) fn free_chain(head: *mut SlotBlock) {
    let mut node = head;
    while !node.is_null() {
        // SAFETY: caller guarantees exclusive ownership of the chain
        // (used only from `Drop` impls and `detach`'s returned guard).
        let mut block = unsafe { Box::from_raw(node) };
        let next_marked = *block.next.get_mut();
        node = if next_marked.is_null() {
            ptr::null_mut()
        } else {
            // SAFETY: same exclusive-ownership guarantee as above.
            let marked = unsafe { Box::from_raw(next_marked) };
            marked.target.load(Ordering::Relaxed)
        };
        // `block` drops here, freeing any buffers still resident.
    }
}

pub(crate) fn marked_ptr_target(marked: *mut MarkedPtr) -> *mut SlotBlock {
    // SAFETY: marked pointers are only ever installed by `try_link_next`
    // and never freed while reachable from a live bucket.
    unsafe { &*marked }.target.load(Ordering::Acquire)
}

pub(crate) fn new_marked_ptr(target: *mut SlotBlock) -> *mut MarkedPtr {
    Box::into_raw(Box::new(MarkedPtr::new(target)))
}

/// SAFETY: free a `MarkedPtr` that lost a `try_link_next` race and was
/// never published into any bucket's chain.
pub(crate) unsafe fn free_unlinked_marked_ptr(marked: *mut MarkedPtr) {
    drop(Box::from_raw(marked));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_roundtrip() {
        let block = SlotBlock::new();
        assert!(block.try_push(vec![1, 2, 3]).is_ok());
        assert_eq!(block.length(), 1);
        let popped = block.try_pop().unwrap();
        assert_eq!(popped, vec![1, 2, 3]);
        assert_eq!(block.length(), 0);
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let block = SlotBlock::new();
        assert!(block.try_pop().is_none());
    }

    #[test]
    fn push_fails_when_full() {
        let block = SlotBlock::new();
        for i in 0..K {
            assert!(block.try_push(vec![i as u8]).is_ok());
        }
        assert_eq!(block.length(), K);
        let overflow = block.try_push(vec![255]);
        assert!(overflow.is_err());
        assert_eq!(overflow.unwrap_err(), vec![255]);
    }

    #[test]
    fn concurrent_push_pop_conserves_count() {
        use std::sync::Arc;
        use std::thread;

        let block = Arc::new(SlotBlock::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let block = Arc::clone(&block);
            handles.push(thread::spawn(move || {
                for i in 0..4 {
                    while block.try_push(vec![t, i]).is_err() {
                        std::thread::yield_now();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(block.length(), 32);

        let mut popped = 0;
        while block.try_pop().is_some() {
            popped += 1;
        }
        assert_eq!(popped, 32);
        assert_eq!(block.length(), 0);
    }
}
