//! Hardware Abstraction Layer for usb-solder-iron.
//!
//! Thin wrappers around ESP-IDF peripherals.
//! Protocol and control logic stay in core modules, HAL is just I/O.

pub mod gpio;
pub mod usb;

pub use gpio::EspGpioPorts;
pub use usb::{TransportError, UsbCdc};
