//! GPIO lanes behind the register ports.
//!
//! Each port letter maps to eight consecutive GPIOs starting at
//! `DeviceConfig::port_lanes`. Bits cleared in `port_masks` have no pin and
//! read as 0. DDR and PORT are shadowed; PIN reads the pads.
//!
//! As on AVR parts, a PORT bit on an input pin selects the
//! pull-up.

use esp_idf_svc::sys::{self, esp, EspError};

use crate::config::DeviceConfig;
use crate::registers::{Port, PortIo};

/// [`PortIo`] over ESP32 GPIO.
pub struct EspGpioPorts {
    lanes: [u8; 4],
    masks: [u8; 4],
    ddr: [u8; 4],
    output: [u8; 4],
}

impl EspGpioPorts {
    /// Reset every lane pin, then apply the power-on state: heater and
    /// indicator outputs off (high), button and event inputs pulled up.
    pub fn new(config: &DeviceConfig) -> Result<Self, EspError> {
        let mut ports = Self {
            lanes: config.port_lanes,
            masks: config.port_masks,
            ddr: [0; 4],
            output: [0; 4],
        };

        for port in Port::ALL {
            for bit in 0..8 {
                if let Some(gpio) = ports.gpio(port, bit) {
                    esp!(unsafe { sys::gpio_reset_pin(gpio) })?;
                }
            }
        }

        let mut ddr = [0u8; 4];
        let mut out = [0u8; 4];
        for gpio in [config.heater_gpio, config.indicator_gpio] {
            if let Some((port, bit)) = ports.locate(gpio) {
                ddr[port.index()] |= bit;
                out[port.index()] |= bit;
            }
        }
        for gpio in [config.button_gpio, config.event_gpio] {
            if let Some((port, bit)) = ports.locate(gpio) {
                out[port.index()] |= bit;
            }
        }

        for port in Port::ALL {
            ports.set_direction(port, ddr[port.index()]);
            ports.set_output(port, out[port.index()]);
        }
        Ok(ports)
    }

    /// GPIO behind `port` bit `bit`, if wired.
    fn gpio(&self, port: Port, bit: u8) -> Option<i32> {
        let i = port.index();
        (self.masks[i] & (1 << bit) != 0).then(|| (self.lanes[i] + bit) as i32)
    }

    /// Port and bit mask of a GPIO, if it sits in a lane.
    fn locate(&self, gpio: i32) -> Option<(Port, u8)> {
        Port::ALL.into_iter().find_map(|port| {
            let base = self.lanes[port.index()] as i32;
            let bit = gpio - base;
            ((0..8).contains(&bit) && self.masks[port.index()] & (1 << bit) != 0).then(|| (port, 1u8 << bit))
        })
    }

    /// Push the shadow registers of `port` to the pads.
    fn apply(&self, port: Port) {
        let i = port.index();
        for bit in 0..8 {
            let Some(gpio) = self.gpio(port, bit) else {
                continue;
            };
            let mask = 1u8 << bit;
            let high = self.output[i] & mask != 0;

            // Pins are valid by construction; driver errors cannot occur
            unsafe {
                if self.ddr[i] & mask != 0 {
                    sys::gpio_set_level(gpio, high as u32);
                    sys::gpio_set_direction(gpio, sys::gpio_mode_t_GPIO_MODE_INPUT_OUTPUT);
                } else {
                    sys::gpio_set_direction(gpio, sys::gpio_mode_t_GPIO_MODE_INPUT);
                    sys::gpio_set_pull_mode(
                        gpio,
                        if high {
                            sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY
                        } else {
                            sys::gpio_pull_mode_t_GPIO_FLOATING
                        },
                    );
                }
            }
        }
    }
}

impl PortIo for EspGpioPorts {
    fn pins(&self, port: Port) -> u8 {
        let mut levels = 0u8;
        for bit in 0..8 {
            if let Some(gpio) = self.gpio(port, bit) {
                if unsafe { sys::gpio_get_level(gpio) } != 0 {
                    levels |= 1 << bit;
                }
            }
        }
        levels
    }

    fn direction(&self, port: Port) -> u8 {
        self.ddr[port.index()]
    }

    fn set_direction(&mut self, port: Port, value: u8) {
        self.ddr[port.index()] = value & self.masks[port.index()];
        self.apply(port);
    }

    fn output(&self, port: Port) -> u8 {
        self.output[port.index()]
    }

    fn set_output(&mut self, port: Port, value: u8) {
        self.output[port.index()] = value & self.masks[port.index()];
        self.apply(port);
    }
}

/// Drive an active-low output.
#[inline]
pub fn set_active_low(gpio: i32, active: bool) {
    unsafe {
        sys::gpio_set_level(gpio, (!active) as u32);
    }
}

/// Sample an active-low input into bit `mask` of an otherwise released byte.
#[inline]
pub fn sample_active_low(gpio: i32, mask: u8) -> u8 {
    let level = unsafe { sys::gpio_get_level(gpio) };
    if level == 0 {
        !mask
    } else {
        0xFF
    }
}
