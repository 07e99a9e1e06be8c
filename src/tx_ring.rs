//! Outbound byte ring (device → host).
//!
//! # Architecture
//!
//! ```text
//! Interpreter ──┐
//!               ├──▶ TxRing ──────▶ BulkInPump ──▶ USB bulk-in
//! Event latch ──┘    (SPSC)         (≤ 8 bytes per transaction)
//! ```
//!
//! # Rules
//!
//! - Only the main loop pushes, only the transport glue drains
//! - Only atomic operations for synchronization
//! - No operation shall block
//!
//! Overflow is not handled: pushing more than `N` bytes between two drains
//! overwrites unread bytes. The ring is sized so a full burst of replies fits.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// Default ring size.
pub const TX_BUFFER_SIZE: usize = 128;

/// Maximum bytes per bulk-in transaction.
pub const MAX_PACKET: usize = 8;

/// Result of one [`TxRing::drain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Bytes copied into the caller's packet.
    pub len: usize,
    /// True when exactly [`MAX_PACKET`] bytes were pulled.
    pub full: bool,
}

/// Lock-free SPSC byte ring.
///
/// # Safety
///
/// Uses `UnsafeCell` internally, sound because:
/// - Single producer (main loop replies and event reports)
/// - Single consumer (bulk-in pump), which owns `read_idx`
/// - The producer publishes bytes with a `Release` store of `write_idx`
pub struct TxRing<const N: usize = TX_BUFFER_SIZE> {
    slots: UnsafeCell<[u8; N]>,

    /// Next write index (monotonically increasing, wraps via mask).
    write_idx: AtomicU32,

    /// Next read index.
    read_idx: AtomicU32,
}

// SAFETY: Single producer, single consumer, atomic coordination.
unsafe impl<const N: usize> Sync for TxRing<N> {}
unsafe impl<const N: usize> Send for TxRing<N> {}

impl<const N: usize> TxRing<N> {
    /// Mask for wrapping index to buffer size.
    const MASK: usize = N - 1;

    /// Create a new empty ring.
    ///
    /// # Panics
    ///
    /// Panics at compile time if N is not a power of 2.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "TX ring size must be power of 2");

        Self {
            slots: UnsafeCell::new([0; N]),
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
        }
    }

    /// Append one byte. Never blocks.
    #[inline]
    pub fn push(&self, byte: u8) {
        let idx = self.write_idx.load(Ordering::Relaxed);

        // SAFETY: Single producer, slot not visible to the consumer yet
        unsafe {
            (*self.slots.get())[(idx as usize) & Self::MASK] = byte;
        }

        self.write_idx.store(idx.wrapping_add(1), Ordering::Release);
    }

    /// Append a byte slice.
    #[inline]
    pub fn push_slice(&self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    /// Pull up to [`MAX_PACKET`] bytes into `packet`.
    #[inline]
    pub fn drain(&self, packet: &mut [u8; MAX_PACKET]) -> Chunk {
        let chunk = self.peek(packet);
        self.consume(chunk.len);
        chunk
    }

    /// Copy up to [`MAX_PACKET`] bytes into `packet` without consuming them.
    #[inline]
    pub fn peek(&self, packet: &mut [u8; MAX_PACKET]) -> Chunk {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        let len = (write.wrapping_sub(read) as usize).min(MAX_PACKET);

        for (i, slot) in packet.iter_mut().take(len).enumerate() {
            // SAFETY: Single consumer, bytes below write_idx are published
            *slot = unsafe { (*self.slots.get())[(read as usize + i) & Self::MASK] };
        }

        Chunk {
            len,
            full: len == MAX_PACKET,
        }
    }

    /// Release `len` bytes previously returned by [`TxRing::peek`].
    ///
    /// Clamped to the bytes actually pending.
    #[inline]
    pub fn consume(&self, len: usize) {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        let len = len.min(write.wrapping_sub(read) as usize);

        self.read_idx
            .store(read.wrapping_add(len as u32), Ordering::Release);
    }

    /// Bytes waiting to be drained.
    #[inline]
    pub fn len(&self) -> usize {
        let write = self.write_idx.load(Ordering::Acquire);
        let read = self.read_idx.load(Ordering::Relaxed);
        write.wrapping_sub(read) as usize
    }

    /// True when nothing is waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the buffer capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// `core::fmt::Write` handle for formatted replies.
    #[inline]
    pub fn writer(&self) -> TxWriter<'_, N> {
        TxWriter { ring: self }
    }
}

impl<const N: usize> Default for TxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Formatting adapter pushing into a [`TxRing`].
pub struct TxWriter<'a, const N: usize> {
    ring: &'a TxRing<N>,
}

impl<const N: usize> fmt::Write for TxWriter<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.ring.push_slice(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_ring_drain_in_order() {
        let ring = TxRing::<16>::new();
        ring.push_slice(b"abc");

        let mut packet = [0u8; MAX_PACKET];
        let chunk = ring.drain(&mut packet);

        assert_eq!(chunk, Chunk { len: 3, full: false });
        assert_eq!(&packet[..3], b"abc");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_peek_keeps_bytes_until_consumed() {
        let ring = TxRing::<16>::new();
        ring.push_slice(b"5A\r\n");

        let mut packet = [0u8; MAX_PACKET];
        assert_eq!(ring.peek(&mut packet).len, 4);
        assert_eq!(ring.len(), 4);

        ring.consume(2);
        let chunk = ring.peek(&mut packet);
        assert_eq!(&packet[..chunk.len], b"\r\n");

        // Never past the write cursor
        ring.consume(10);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_caps_chunk_at_eight() {
        let ring = TxRing::<16>::new();
        ring.push_slice(b"0123456789");

        let mut packet = [0u8; MAX_PACKET];
        let chunk = ring.drain(&mut packet);
        assert!(chunk.full);
        assert_eq!(&packet, b"01234567");
        assert_eq!(ring.len(), 2);

        let chunk = ring.drain(&mut packet);
        assert_eq!(chunk.len, 2);
        assert_eq!(&packet[..2], b"89");
    }

    #[test]
    fn test_ring_wraps_around() {
        let ring = TxRing::<8>::new();
        let mut packet = [0u8; MAX_PACKET];

        ring.push_slice(b"123456");
        ring.drain(&mut packet);

        ring.push_slice(b"abcdef");
        let chunk = ring.drain(&mut packet);
        assert_eq!(chunk.len, 6);
        assert_eq!(&packet[..6], b"abcdef");
    }

    #[test]
    fn test_empty_drain_returns_zero() {
        let ring = TxRing::<8>::new();
        let mut packet = [0u8; MAX_PACKET];
        assert_eq!(ring.drain(&mut packet), Chunk { len: 0, full: false });
    }

    #[test]
    fn test_writer_formats_into_ring() {
        let ring = TxRing::<16>::new();
        let _ = write!(ring.writer(), "{:02X}\r\n", 0x5a);
        assert_eq!(ring.len(), 4);

        let mut packet = [0u8; MAX_PACKET];
        let chunk = ring.drain(&mut packet);
        assert_eq!(&packet[..chunk.len], b"5A\r\n");
    }
}
