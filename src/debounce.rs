//! Button debounce with vertical 2-bit counters.
//!
//! Eight inputs are filtered in parallel, one bit each. A new level is
//! accepted after it has been sampled
//! [`DEBOUNCE_SETTLE_TICKS`](crate::config::DEBOUNCE_SETTLE_TICKS) times in a
//! row; shorter glitches reset the counter for that bit.
//!
//! The sampling tick runs in timer context and owns the counters. The main
//! loop only consumes press edges, inside a critical section.

use core::cell::Cell;
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::Mutex;

/// Per-tick filter state for 8 inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerticalCounter {
    ct0: u8,
    ct1: u8,
    /// Debounced state, 1 = pressed.
    stable: u8,
}

impl VerticalCounter {
    /// All inputs released, counters idle.
    pub const fn new() -> Self {
        Self {
            ct0: 0xFF,
            ct1: 0xFF,
            stable: 0,
        }
    }

    /// Feed one raw sample (active low) and return the bits that settled
    /// to "pressed" on this tick.
    #[inline]
    pub fn sample(&mut self, raw: u8) -> u8 {
        let changed = self.stable ^ !raw;
        self.ct0 = !(self.ct0 & changed);
        self.ct1 = self.ct0 ^ (self.ct1 & changed);

        let settled = changed & self.ct0 & self.ct1;
        self.stable ^= settled;
        self.stable & settled
    }

    /// Debounced state, 1 = pressed.
    #[inline]
    pub fn stable(&self) -> u8 {
        self.stable
    }
}

impl Default for VerticalCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Debouncer shared between the sampling tick and the main loop.
pub struct Debouncer {
    counter: Mutex<Cell<VerticalCounter>>,

    /// Press edges not yet consumed.
    press: AtomicU8,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            counter: Mutex::new(Cell::new(VerticalCounter::new())),
            press: AtomicU8::new(0),
        }
    }

    /// Sampling tick (timer context).
    #[inline]
    pub fn tick(&self, raw: u8) {
        let pressed = critical_section::with(|cs| {
            let cell = self.counter.borrow(cs);
            let mut counter = cell.get();
            let pressed = counter.sample(raw);
            cell.set(counter);
            pressed
        });

        if pressed != 0 {
            self.press.fetch_or(pressed, Ordering::AcqRel);
        }
    }

    /// Take the latched presses selected by `mask` (main loop).
    ///
    /// Each press is returned exactly once.
    #[inline]
    pub fn consume_press(&self, mask: u8) -> u8 {
        critical_section::with(|_cs| {
            let taken = self.press.load(Ordering::Acquire) & mask;
            self.press.fetch_and(!taken, Ordering::AcqRel);
            taken
        })
    }

    /// Debounced level of all inputs, 1 = pressed.
    pub fn stable(&self) -> u8 {
        critical_section::with(|cs| self.counter.borrow(cs).get().stable())
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEBOUNCE_SETTLE_TICKS;

    const BUTTON: u8 = 1 << 3;
    const RELEASED: u8 = 0xFF;
    const PRESSED: u8 = !BUTTON;

    #[test]
    fn test_press_settles_after_settle_ticks() {
        let mut counter = VerticalCounter::new();

        for _ in 0..DEBOUNCE_SETTLE_TICKS - 1 {
            assert_eq!(counter.sample(PRESSED), 0);
        }
        assert_eq!(counter.sample(PRESSED), BUTTON);
        assert_eq!(counter.stable(), BUTTON);

        // Holding does not produce more edges
        for _ in 0..20 {
            assert_eq!(counter.sample(PRESSED), 0);
        }
    }

    #[test]
    fn test_short_glitch_rejected() {
        let mut counter = VerticalCounter::new();

        for _ in 0..10 {
            for _ in 0..DEBOUNCE_SETTLE_TICKS - 1 {
                assert_eq!(counter.sample(PRESSED), 0);
            }
            assert_eq!(counter.sample(RELEASED), 0);
        }
        assert_eq!(counter.stable(), 0);
    }

    #[test]
    fn test_release_also_debounced() {
        let mut counter = VerticalCounter::new();
        for _ in 0..DEBOUNCE_SETTLE_TICKS {
            counter.sample(PRESSED);
        }

        for _ in 0..DEBOUNCE_SETTLE_TICKS - 1 {
            counter.sample(RELEASED);
            assert_eq!(counter.stable(), BUTTON);
        }
        counter.sample(RELEASED);
        assert_eq!(counter.stable(), 0);
    }

    #[test]
    fn test_consume_press_once() {
        let debouncer = Debouncer::new();
        for _ in 0..DEBOUNCE_SETTLE_TICKS {
            debouncer.tick(PRESSED);
        }

        assert_eq!(debouncer.consume_press(BUTTON), BUTTON);
        assert_eq!(debouncer.consume_press(BUTTON), 0);
    }

    #[test]
    fn test_consume_press_respects_mask() {
        let debouncer = Debouncer::new();
        for _ in 0..DEBOUNCE_SETTLE_TICKS {
            debouncer.tick(PRESSED);
        }

        assert_eq!(debouncer.consume_press(0x01), 0);
        assert_eq!(debouncer.consume_press(BUTTON), BUTTON);
    }
}
