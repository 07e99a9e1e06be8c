//! Debug UART log output.
//!
//! The USB channel is reserved for the register protocol, so
//! the log stream goes out on a UART TX pin with an external USB-UART
//! adapter.
//!
//! # Hardware Setup
//!
//! ```text
//! ESP32-S3 GPIO43 (U0TXD) ──────▶ USB-UART RX
//!                                  └─▶ PC Serial Monitor
//! ```

use core::fmt::Write;

use crate::logging::{LogEntry, LogStream, SliceWriter};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// UART configuration for logging.
pub struct UartLoggerConfig {
    pub baud_rate: u32,
    pub tx_pin: u8,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            tx_pin: 43,
        }
    }
}

/// Format log entry to bytes.
///
/// Format: `[timestamp_us] LEVEL: message\r\n`
pub fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    let mut writer = SliceWriter { buf, pos: 0 };

    let _ = write!(
        writer,
        "[{:10}] {}: {}\r\n",
        entry.timestamp_us,
        entry.level.as_str(),
        entry.text()
    );

    writer.pos
}

/// Drain every pending entry into `out`, then report drops.
///
/// Returns the number of entries written.
pub fn drain_logs<const N: usize>(stream: &LogStream<N>, out: &mut dyn Write) -> usize {
    let mut format_buf = [0u8; 128];
    let mut count = 0;

    while let Some(entry) = stream.drain() {
        let len = format_log_entry(&entry, &mut format_buf);
        if let Ok(line) = core::str::from_utf8(&format_buf[..len]) {
            let _ = out.write_str(line);
        }
        count += 1;
    }

    let dropped = stream.dropped();
    if dropped > 0 {
        let _ = write!(out, "[WARN] Dropped: {}\r\n", dropped);
        stream.reset_dropped();
    }

    count
}

/// Initialize UART0 TX-only for logging output.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = uart::UART0> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config = uart::config::Config::default()
        .baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )
}

/// `core::fmt::Write` adapter over the UART driver.
#[cfg(target_os = "espidf")]
pub struct UartSink<'a, 'd>(pub &'a mut UartTxDriver<'d>);

#[cfg(target_os = "espidf")]
impl Write for UartSink<'_, '_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write(s.as_bytes()).map(|_| ()).map_err(|_| core::fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MAX_MSG_LEN};

    fn entry(level: LogLevel, text: &[u8]) -> LogEntry {
        let mut msg = [0u8; MAX_MSG_LEN];
        msg[..text.len()].copy_from_slice(text);
        LogEntry {
            timestamp_us: 1234567,
            level,
            len: text.len() as u8,
            msg,
        }
    }

    #[test]
    fn test_format_log_entry() {
        let mut buf = [0u8; 128];
        let len = format_log_entry(&entry(LogLevel::Info, b"power level 2"), &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(formatted.contains("1234567"));
        assert!(formatted.contains("INFO"));
        assert!(formatted.ends_with("power level 2\r\n"));
    }

    #[test]
    fn test_drain_logs_reports_drops() {
        let stream = LogStream::<2>::new();
        stream.push(1, LogLevel::Warn, b"a");
        stream.push(2, LogLevel::Warn, b"b");
        stream.push(3, LogLevel::Warn, b"c");

        let mut out = String::new();
        assert_eq!(drain_logs(&stream, &mut out), 2);
        assert!(out.contains("WARN: a"));
        assert!(out.contains("WARN: b"));
        assert!(out.contains("Dropped: 1"));
        assert_eq!(stream.dropped(), 0);
    }
}
