//! Fixed-capacity byte ring for the inbound serial stream.
//!
//! Writes never fail: when full, the oldest bytes are overwritten so the
//! newest data always survives. Reads are non-destructive peeks; the parser
//! releases bytes explicitly with [`RingBuffer::clear`] once they are
//! consumed.

use log::warn;

/// Byte ring of `N` bytes.
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    read: usize,
    write: usize,
    full: bool,
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            read: 0,
            write: 0,
            full: false,
        }
    }

    /// Append `data`, overwriting the oldest bytes on overflow.
    /// Returns the number of bytes written (always `data.len()`).
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut dropped = 0usize;
        for &b in data {
            if self.full {
                self.read = (self.read + 1) % N;
                dropped += 1;
            }
            self.buf[self.write] = b;
            self.write = (self.write + 1) % N;
            self.full = self.write == self.read;
        }
        if dropped > 0 {
            warn!("RINGBUF: overwrote {} oldest bytes", dropped);
        }
        data.len()
    }

    /// Copy up to `out.len()` bytes from the head without consuming them.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len());
        let first = n.min(N - self.read);
        out[..first].copy_from_slice(&self.buf[self.read..self.read + first]);
        out[first..n].copy_from_slice(&self.buf[..n - first]);
        n
    }

    /// Release `n` bytes from the head. Releasing at least `len()` flushes.
    /// Returns the number of bytes released.
    pub fn clear(&mut self, n: usize) -> usize {
        let len = self.len();
        if len == 0 {
            warn!("RINGBUF: clear({}) on empty buffer", n);
            return 0;
        }
        if n >= len {
            self.flush();
            return len;
        }
        if n == 0 {
            return 0;
        }
        self.read = (self.read + n) % N;
        self.full = false;
        n
    }

    /// Drop all buffered bytes.
    pub fn flush(&mut self) {
        self.read = 0;
        self.write = 0;
        self.full = false;
    }

    pub fn len(&self) -> usize {
        if self.full {
            N
        } else if self.write >= self.read {
            self.write - self.read
        } else {
            N - self.read + self.write
        }
    }

    pub fn free_len(&self) -> usize {
        N - self.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
