// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # lfbufpool — size-classed, lock-free byte-buffer pool
//!
//! A pool of reusable byte buffers for high-concurrency producers and
//! consumers of transient byte slices: network servers, serializers,
//! scratch buffers. Callers ask for at least `n` bytes; the pool
//! either hands back a previously released buffer from the matching
//! size class or allocates a fresh one. Callers later release the
//! buffer back.
//!
//! ## Quick start
//!
//! ```
//! use lfbufpool::Pool;
//!
//! let pool = Pool::new();
//! let mut buf = pool.acquire(256);
//! buf.as_mut_slice().copy_from_slice(&[0u8; 256]);
//! pool.release(buf);
//! ```
//!
//! ## Scoped handles
//!
//! ```
//! use lfbufpool::Pool;
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(Pool::new());
//! {
//!     let mut handle = pool.acquire_buffer(64);
//!     write!(handle, "hello").unwrap();
//!     assert_eq!(handle.as_bytes(), b"hello");
//! } // released automatically here
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Pool
//!  +-- buckets[32]            one per size class (capacity = 2^(i+1))
//!       +-- Bucket            head of a slot-block chain
//!            +-- SlotBlock    fixed K=64 slots, lock-free push/pop
//!                 +-- SlotBlock (next, installed on overflow)
//!  +-- Stats (optional)       per-class counters + periodic adaptation
//! ```
//!
//! ## Non-goals
//!
//! Strict LIFO/FIFO ordering, per-caller fairness, shrinking memory
//! back to the OS, arena-style bulk release, cross-pool migration,
//! persistence, zeroing on reuse.

mod bucket;
mod buffer;
mod error;
mod handle;
mod pool;
mod slot_block;
mod stats;
mod table;

pub use buffer::Buffer;
pub use error::PoolError;
pub use handle::Handle;
pub use pool::Pool;
pub use table::{capacity, class_of, MAX_CAPACITY, MIN_CAPACITY, NUM_CLASSES};
