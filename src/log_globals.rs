//! Global log stream instance.

use crate::logging::LogStream;

/// Device log stream.
///
/// Written by the main loop and the timer callbacks, drained to the debug
/// UART by the main loop.
pub static LOG_STREAM: LogStream = LogStream::new();
