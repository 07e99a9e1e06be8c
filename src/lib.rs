//! # usb-solder-iron
//!
//! Firmware core for a USB-attached soldering iron controller.
//!
//! ## Architecture
//!
//! The host talks a tiny register protocol over USB CDC. Interrupt handlers
//! (PWM timer, debounce timer, event input) only touch atomics in
//! [`DeviceState`]; a single cooperative [`MainLoop`] does everything else:
//! - host bytes go through the [`Interpreter`] into the [`RegisterMap`]
//! - replies and event reports queue in the [`TxRing`]
//! - the bulk-in pump sends the ring in 8-byte packets
//! - debounced button presses step the heater power level
//!
//! Everything outside [`hal`] runs on the host as well.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod debounce;
pub mod device;
pub mod event_latch;
pub mod heater;
pub mod interpreter;
pub mod log_globals;
pub mod logging;
pub mod registers;
pub mod transport;
pub mod tx_ring;
pub mod uart_logger;

#[cfg(target_os = "espidf")]
pub mod hal;

pub use config::{DeviceConfig, CONFIG};
pub use debounce::Debouncer;
pub use device::{DeviceState, MainLoop, PollReport, DEVICE};
pub use event_latch::{InterruptLatch, InterruptSource};
pub use heater::{HeaterPwm, PowerLevels, PwmEdge};
pub use interpreter::Interpreter;
pub use registers::{RegisterAddress, RegisterBus, RegisterError, RegisterMap, SimulatedPorts};
pub use transport::{BulkInPump, CdcTransport, SerialStateNotifier};
pub use tx_ring::TxRing;
