// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scoped buffer handle: the ergonomic façade over `Pool` that
//! guarantees release on every exit path.
//!
//! Grounded on `examples/original_source/buffer.go`'s `Buffer` type
//! (`Release`/`Reset`/`Write`/`WriteString`/`WriteByte`/`ReadFrom`)
//! rendered with idiomatic `std::io::{Read, Write}` adapters instead
//! of Go's `io.Writer`/`io.Reader` interfaces.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::pool::Pool;

/// A buffer on loan from a [`Pool`], released automatically on drop.
///
/// Dropping (or calling [`Handle::release`] explicitly) returns the
/// backing buffer to the pool it came from via `release` or
/// `auto_release`, depending on how the handle was acquired. After
/// release the handle holds nothing; further calls to `release` are
/// no-ops, and any other operation panics (using a handle past
/// release is a programmer error, not a recoverable one).
pub struct Handle {
    buffer: Option<Buffer>,
    pool: Option<Arc<Pool>>,
    auto: bool,
}

impl Handle {
    pub(crate) fn new(mut buffer: Buffer, pool: Arc<Pool>, auto: bool) -> Self {
        buffer.reset();
        Self {
            buffer: Some(buffer),
            pool: Some(pool),
            auto,
        }
    }

    fn buffer(&self) -> &Buffer {
        self.buffer
            .as_ref()
            .expect("lfbufpool: handle used after release")
    }

    fn buffer_mut(&mut self) -> &mut Buffer {
        self.buffer
            .as_mut()
            .expect("lfbufpool: handle used after release")
    }

    /// Replace the contents with `bytes`.
    pub fn set_bytes(&mut self, bytes: &[u8]) {
        let buf = self.buffer_mut();
        buf.reset();
        buf.append_bytes(bytes);
    }

    /// Replace the contents with `s`'s UTF-8 bytes.
    pub fn set_string(&mut self, s: &str) {
        self.set_bytes(s.as_bytes());
    }

    /// Append `bytes` to the current contents.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer_mut().append_bytes(bytes);
    }

    /// Append `s`'s UTF-8 bytes to the current contents.
    pub fn append_str(&mut self, s: &str) {
        self.buffer_mut().append_bytes(s.as_bytes());
    }

    /// Append a single byte to the current contents.
    pub fn append_byte(&mut self, byte: u8) {
        self.buffer_mut().append_byte(byte);
    }

    /// Zero the logical length; the backing allocation is kept.
    pub fn reset(&mut self) {
        self.buffer_mut().reset();
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer().as_slice()
    }

    /// Lossy UTF-8 view of the current contents.
    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Write the current contents to `writer` and reset the length.
    pub fn drain_to<W: io::Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let len = self.buffer().len();
        writer.write_all(self.buffer().as_slice())?;
        self.buffer_mut().reset();
        Ok(len)
    }

    /// Read from `reader` until EOF, appending to the current
    /// contents. Growth doubles the backing allocation each time it
    /// fills, starting at 64 bytes if the handle's buffer somehow
    /// starts with no capacity at all (pool-issued buffers never do —
    /// this only guards a handle constructed directly in tests).
    pub fn read_from<R: io::Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let buf = self.buffer_mut();
        if buf.capacity() == 0 {
            buf.grow_to(64);
        }
        let mut total = 0usize;
        loop {
            if buf.len() == buf.capacity() {
                let doubled = buf.capacity() * 2;
                buf.grow_to(doubled);
            }
            match reader.read(buf.spare_capacity_mut())? {
                0 => return Ok(total),
                n => {
                    buf.advance(n);
                    total += n;
                }
            }
        }
    }

    /// Explicitly release the buffer back to its pool, via `release`
    /// or `auto_release` depending on how this handle was acquired.
    /// Idempotent: a second call is a no-op.
    pub fn release(&mut self) {
        if let (Some(buf), Some(pool)) = (self.buffer.take(), self.pool.take()) {
            if self.auto {
                pool.auto_release(buf);
            } else {
                pool.release(buf);
            }
        }
    }

    /// Take the buffer and clear the pool reference without invoking
    /// either release path — used by `Pool::release_buffer` and
    /// `Pool::auto_release_buffer`, which apply their own release mode
    /// regardless of how the handle was acquired.
    pub(crate) fn take_buffer(&mut self) -> Option<Buffer> {
        self.pool = None;
        self.buffer.take()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

impl io::Write for Handle {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.append_bytes(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("len", &self.buffer.as_ref().map(Buffer::len))
            .field("auto", &self.auto)
            .field("released", &self.buffer.is_none())
            .finish()
    }
}
