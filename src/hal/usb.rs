//! USB CDC over the ESP32-S3 USB Serial/JTAG controller.
//!
//! The controller enumerates as CDC-ACM in hardware and answers the class
//! requests itself. Packetizing and the serial-state endpoint are handled
//! by the peripheral, so the notification path is accepted and discarded.

use core::fmt;

use esp_idf_svc::hal::delay::NON_BLOCK;
use esp_idf_svc::hal::gpio;
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::usb_serial::{UsbSerialConfig, UsbSerialDriver, USB_SERIAL};
use esp_idf_svc::sys::EspError;

use crate::transport::CdcTransport;

/// USB transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Driver read failed (ESP error code).
    Read(i32),
    /// Driver write failed (ESP error code).
    Write(i32),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Read(_) => "U01",
            TransportError::Write(_) => "U02",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            TransportError::Read(_) => "usb read failed",
            TransportError::Write(_) => "usb write failed",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Read(e) | TransportError::Write(e) => {
                write!(f, "{} {} ({})", self.code(), self.message(), e)
            }
        }
    }
}

/// [`CdcTransport`] over [`UsbSerialDriver`].
pub struct UsbCdc<'d> {
    driver: UsbSerialDriver<'d>,
}

impl<'d> UsbCdc<'d> {
    pub fn new(
        usb: impl Peripheral<P = USB_SERIAL> + 'd,
        d_minus: impl Peripheral<P = gpio::Gpio19> + 'd,
        d_plus: impl Peripheral<P = gpio::Gpio20> + 'd,
    ) -> Result<Self, EspError> {
        let driver = UsbSerialDriver::new(usb, d_minus, d_plus, &UsbSerialConfig::new())?;
        Ok(Self { driver })
    }
}

impl CdcTransport for UsbCdc<'_> {
    type Error = TransportError;

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.driver
            .read(buf, NON_BLOCK)
            .map_err(|e| TransportError::Read(e.code()))
    }

    fn bulk_in_ready(&self) -> bool {
        true
    }

    fn send_bulk_in(&mut self, packet: &[u8]) -> Result<usize, TransportError> {
        // The controller flushes on its own; a terminator has no payload
        if packet.is_empty() {
            return Ok(0);
        }

        // Whatever the FIFO has no room for stays in the ring
        self.driver
            .write(packet, NON_BLOCK)
            .map_err(|e| TransportError::Write(e.code()))
    }

    fn notify_ready(&self) -> bool {
        true
    }

    fn send_notification(&mut self, _packet: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}
