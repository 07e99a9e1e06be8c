//! Interrupt event latch.
//!
//! Interrupt handlers only set a flag. The main loop reports at most one
//! pending event per iteration as `\XX\r\n`, lowest ID first.
//!
//! Multiple raises of the same ID before a drain collapse into one report.

use core::fmt::Write;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::tx_ring::TxRing;

/// Lowest reportable event ID.
pub const EVENT_MIN: u8 = 2;

/// Highest reportable event ID.
pub const EVENT_MAX: u8 = 15;

/// Interrupt sources, numbered after the ATtiny85 vector table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptSource {
    /// External interrupt pin.
    Int0 = 2,
    Timer1CompareA = 4,
    EepromReady = 7,
    AnalogComparator = 8,
    Adc = 9,
    Timer1CompareB = 10,
    Timer0CompareA = 11,
    Timer0CompareB = 12,
    Watchdog = 13,
    UsiStart = 14,
    UsiOverflow = 15,
}

impl InterruptSource {
    /// Event ID reported to the host.
    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// Pending-event bitset shared between interrupt handlers and the main loop.
pub struct InterruptLatch {
    /// Bit `n` set means event `n` is pending.
    flags: AtomicU32,
}

impl InterruptLatch {
    /// Create a latch with nothing pending.
    pub const fn new() -> Self {
        Self {
            flags: AtomicU32::new(0),
        }
    }

    /// Mark an event pending (interrupt context).
    ///
    /// IDs outside `EVENT_MIN..=EVENT_MAX` are ignored.
    #[inline]
    pub fn raise(&self, id: u8) {
        if (EVENT_MIN..=EVENT_MAX).contains(&id) {
            self.flags.fetch_or(1 << id, Ordering::AcqRel);
        }
    }

    /// Mark a known source pending.
    #[inline]
    pub fn raise_source(&self, source: InterruptSource) {
        self.raise(source.id());
    }

    /// Check whether an event is pending without clearing it.
    #[inline]
    pub fn is_pending(&self, id: u8) -> bool {
        id < 32 && self.flags.load(Ordering::Acquire) & (1 << id) != 0
    }

    /// Clear and return the lowest pending event ID.
    #[inline]
    pub fn take_lowest(&self) -> Option<u8> {
        let pending = self.flags.load(Ordering::Acquire) & Self::RANGE_MASK;
        if pending == 0 {
            return None;
        }

        let id = pending.trailing_zeros() as u8;
        // Test-and-clear: a concurrent raise of another ID survives
        self.flags.fetch_and(!(1 << id), Ordering::AcqRel);
        Some(id)
    }

    /// Report at most one pending event into the TX ring.
    ///
    /// Returns the reported ID.
    pub fn drain_one<const N: usize>(&self, tx: &TxRing<N>) -> Option<u8> {
        let id = self.take_lowest()?;
        let _ = write!(tx.writer(), "\\{:02X}\r\n", id);
        Some(id)
    }

    const RANGE_MASK: u32 = {
        let mut mask = 0u32;
        let mut id = EVENT_MIN;
        while id <= EVENT_MAX {
            mask |= 1 << id;
            id += 1;
        }
        mask
    };
}

impl Default for InterruptLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_ring::MAX_PACKET;

    fn drained(tx: &TxRing<32>) -> ([u8; MAX_PACKET], usize) {
        let mut packet = [0u8; MAX_PACKET];
        let chunk = tx.drain(&mut packet);
        (packet, chunk.len)
    }

    #[test]
    fn test_repeated_raise_reports_once() {
        let latch = InterruptLatch::new();
        let tx = TxRing::<32>::new();

        latch.raise(4);
        latch.raise(4);
        latch.raise(4);

        assert_eq!(latch.drain_one(&tx), Some(4));
        assert_eq!(latch.drain_one(&tx), None);

        let (packet, len) = drained(&tx);
        assert_eq!(&packet[..len], b"\\04\r\n");
    }

    #[test]
    fn test_lowest_id_first() {
        let latch = InterruptLatch::new();
        let tx = TxRing::<32>::new();

        latch.raise_source(InterruptSource::Watchdog);
        latch.raise_source(InterruptSource::Int0);

        assert_eq!(latch.drain_one(&tx), Some(2));
        assert!(latch.is_pending(13));
        assert_eq!(latch.drain_one(&tx), Some(13));
        assert!(!latch.is_pending(13));
    }

    #[test]
    fn test_out_of_range_ignored() {
        let latch = InterruptLatch::new();
        latch.raise(0);
        latch.raise(1);
        latch.raise(16);
        latch.raise(200);
        assert_eq!(latch.take_lowest(), None);
    }

    #[test]
    fn test_hex_id_is_uppercase() {
        let latch = InterruptLatch::new();
        let tx = TxRing::<32>::new();

        latch.raise_source(InterruptSource::Timer0CompareA);
        latch.drain_one(&tx);

        let (packet, len) = drained(&tx);
        assert_eq!(&packet[..len], b"\\0B\r\n");
    }
}
