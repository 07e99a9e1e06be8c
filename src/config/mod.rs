//! Module: config
//!
//! Purpose: Static device configuration for usb-solder-iron.
//!
//! Everything here is fixed at build time. The device keeps no state across
//! power cycles, so there is no NVS layer: the running values live in
//! [`crate::device::DeviceState`] and start from [`CONFIG`] on every boot.

/// Identification string returned by the `@` command.
pub const WHO: &str = "usb_solderin_iron v0.1";

/// Build version string (set by build.rs, includes git hash).
pub const VERSION: &str = env!("VERSION_STRING");

/// Number of heater power steps (including "off").
pub const PWR_STEPS_LEN: usize = 4;

/// Consecutive sampling ticks before a new input level is accepted.
pub const DEBOUNCE_SETTLE_TICKS: u32 = 4;

/// Bit of the button within the sampled input byte.
pub const BUTTON_MASK: u8 = 1 << 3;

/// Device configuration.
#[derive(Clone, Copy, Debug)]
pub struct DeviceConfig {
    /// Reply to the `@` command.
    pub who: &'static str,

    /// Heater duty thresholds, `power_steps[0]` must be 0 (off).
    pub power_steps: [u8; PWR_STEPS_LEN],

    /// PWM timer overflow period in microseconds.
    /// One PWM period is 256 overflows.
    pub pwm_tick_us: u64,

    /// Debounce sampling period in microseconds.
    pub debounce_tick_us: u64,

    /// Heater MOSFET gate (active low).
    pub heater_gpio: i32,

    /// Heater indicator LED (active low).
    pub indicator_gpio: i32,

    /// Power button (active low, pulled up).
    pub button_gpio: i32,

    /// External event input, raises INT0 on a falling edge.
    pub event_gpio: i32,

    /// First GPIO of the 8-bit lane behind each port letter (A, B, C, D).
    pub port_lanes: [u8; 4],

    /// Bits of each lane backed by a usable GPIO. USB D-/D+ (19, 20), the
    /// missing GPIO 22..25 and the log UART TX (43) are masked out. GPIO 26..37
    /// belong to the SPI flash and octal PSRAM and sit in no lane.
    pub port_masks: [u8; 4],
}

impl DeviceConfig {
    /// Factory configuration.
    pub const DEFAULT: Self = Self {
        who: WHO,
        power_steps: [0x00, 0x40, 0x80, 0xFF],
        pwm_tick_us: 4_000,
        debounce_tick_us: 10_000,
        heater_gpio: 9,
        indicator_gpio: 12,
        button_gpio: 11,
        event_gpio: 10,
        port_lanes: [0, 8, 16, 38],
        port_masks: [0xFF, 0xFF, 0x27, 0xDF],
    };

    /// Settle time of the debounce filter in microseconds.
    #[inline]
    pub const fn debounce_settle_us(&self) -> u64 {
        self.debounce_tick_us * DEBOUNCE_SETTLE_TICKS as u64
    }

    /// Full PWM period in microseconds.
    #[inline]
    pub const fn pwm_period_us(&self) -> u64 {
        self.pwm_tick_us * 256
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Active configuration.
pub static CONFIG: DeviceConfig = DeviceConfig::DEFAULT;
