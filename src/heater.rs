//! Heater power control: power-level table and leading-edge PWM.
//!
//! The PWM handler runs on every timer overflow and only compares a
//! wrapping counter against the selected threshold. The power index is a
//! single atomic byte, so the handler never observes a half-written level.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::PWR_STEPS_LEN;

/// Output change requested by one PWM tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PwmEdge {
    /// Period start: heater and indicator on.
    On,
    /// Threshold reached: heater and indicator off.
    Off,
}

/// Ordered duty thresholds with the currently selected index.
pub struct PowerLevels {
    steps: [u8; PWR_STEPS_LEN],
    index: AtomicU8,
}

impl PowerLevels {
    /// Start at step 0 ("off").
    pub const fn new(steps: [u8; PWR_STEPS_LEN]) -> Self {
        Self {
            steps,
            index: AtomicU8::new(0),
        }
    }

    /// Currently selected step.
    #[inline]
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire) as usize % PWR_STEPS_LEN
    }

    /// Duty threshold of the current step (`threshold / 256` duty).
    #[inline]
    pub fn threshold(&self) -> u8 {
        self.steps[self.index()]
    }

    /// Step to the next level, wrapping to "off" after the last one.
    ///
    /// Returns the new index.
    pub fn advance(&self) -> usize {
        critical_section::with(|_cs| {
            let next = (self.index() + 1) % PWR_STEPS_LEN;
            self.index.store(next as u8, Ordering::Release);
            next
        })
    }

    /// Number of steps.
    #[inline]
    pub const fn len(&self) -> usize {
        PWR_STEPS_LEN
    }

    /// The full step table.
    #[inline]
    pub fn steps(&self) -> &[u8; PWR_STEPS_LEN] {
        &self.steps
    }
}

/// Leading-edge PWM comparator.
pub struct HeaterPwm {
    counter: AtomicU8,
}

impl HeaterPwm {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU8::new(0),
        }
    }

    /// Timer overflow (interrupt context).
    ///
    /// The threshold check comes first so a threshold of 0 never turns the
    /// outputs on.
    #[inline]
    pub fn tick(&self, threshold: u8) -> Option<PwmEdge> {
        // Single writer: only the PWM handler advances the counter
        let count = self.counter.load(Ordering::Relaxed);
        self.counter.store(count.wrapping_add(1), Ordering::Relaxed);

        if count == threshold {
            Some(PwmEdge::Off)
        } else if count == 0 {
            Some(PwmEdge::On)
        } else {
            None
        }
    }

    /// Current counter value.
    #[inline]
    pub fn counter(&self) -> u8 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for HeaterPwm {
    fn default() -> Self {
        Self::new()
    }
}
