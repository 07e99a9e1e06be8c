//! usb-solder-iron - Main entry point
//!
//! On the ESP32-S3 this brings up the GPIO lanes, the PWM and debounce
//! timers, the event input and USB, then runs the poll loop forever.
//!
//! On the host it runs the same core as a simulator: stdin is the host→device
//! stream, stdout receives the replies, stderr the log.

#[cfg(target_os = "espidf")]
fn main() -> Result<(), esp_idf_svc::sys::EspError> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> std::io::Result<()> {
    simulator::run()
}

#[cfg(target_os = "espidf")]
mod firmware {
    use core::time::Duration;

    use esp_idf_svc::hal::gpio::{InterruptType, PinDriver, Pull};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::sys::{self, EspError};
    use esp_idf_svc::timer::EspTaskTimerService;

    use usb_solder_iron::config::{BUTTON_MASK, CONFIG, VERSION};
    use usb_solder_iron::hal::{gpio, EspGpioPorts, UsbCdc};
    use usb_solder_iron::log_globals::LOG_STREAM;
    use usb_solder_iron::uart_logger::{drain_logs, init_uart_logger, UartLoggerConfig, UartSink};
    use usb_solder_iron::{InterruptSource, MainLoop, PwmEdge, RegisterMap, DEVICE};

    fn timestamp_us() -> i64 {
        unsafe { sys::esp_timer_get_time() }
    }

    pub fn run() -> Result<(), EspError> {
        sys::link_patches();

        let peripherals = Peripherals::take()?;

        let mut uart = init_uart_logger(peripherals.uart0, peripherals.pins.gpio43, &UartLoggerConfig::default())?;
        usb_solder_iron::rt_info!(LOG_STREAM, timestamp_us(), "{}", VERSION);

        let ports = EspGpioPorts::new(&CONFIG)?;

        // Heater PWM: one call per counter step
        let timers = EspTaskTimerService::new()?;
        let pwm_timer = timers.timer(|| match DEVICE.pwm_tick() {
            Some(PwmEdge::On) => {
                gpio::set_active_low(CONFIG.heater_gpio, true);
                gpio::set_active_low(CONFIG.indicator_gpio, true);
            }
            Some(PwmEdge::Off) => {
                gpio::set_active_low(CONFIG.heater_gpio, false);
                gpio::set_active_low(CONFIG.indicator_gpio, false);
            }
            None => {}
        })?;
        pwm_timer.every(Duration::from_micros(CONFIG.pwm_tick_us))?;

        let debounce_timer = timers.timer(|| {
            DEVICE.debounce_tick(gpio::sample_active_low(CONFIG.button_gpio, BUTTON_MASK));
        })?;
        debounce_timer.every(Duration::from_micros(CONFIG.debounce_tick_us))?;

        // External event on falling edge, reported as INT0
        let mut event_pin = PinDriver::input(peripherals.pins.gpio10)?;
        event_pin.set_pull(Pull::Up)?;
        event_pin.set_interrupt_type(InterruptType::NegEdge)?;
        unsafe {
            event_pin.subscribe(|| DEVICE.raise(InterruptSource::Int0))?;
        }
        event_pin.enable_interrupt()?;

        let mut usb = UsbCdc::new(peripherals.usb_serial, peripherals.pins.gpio19, peripherals.pins.gpio20)?;
        let mut main_loop: MainLoop<'_, _> = MainLoop::new(&DEVICE, RegisterMap::new(ports), CONFIG.who);

        usb_solder_iron::rt_info!(LOG_STREAM, timestamp_us(), "ready");

        loop {
            let report = main_loop.poll_once(&mut usb, timestamp_us());

            // The driver disarms the pin after each edge
            if report.event.is_some() {
                event_pin.enable_interrupt()?;
            }

            drain_logs(&LOG_STREAM, &mut UartSink(&mut uart));

            if report.received == 0 && report.sent.is_none() {
                unsafe {
                    sys::vTaskDelay(1);
                }
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod simulator {
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::sync::mpsc::{self, Receiver, TryRecvError};
    use std::thread;
    use std::time::{Duration, Instant};

    use usb_solder_iron::config::{CONFIG, VERSION};
    use usb_solder_iron::log_globals::LOG_STREAM;
    use usb_solder_iron::uart_logger::drain_logs;
    use usb_solder_iron::{CdcTransport, MainLoop, RegisterMap, SimulatedPorts, DEVICE};

    #[derive(Debug)]
    enum SimError {
        Io(io::ErrorKind),
    }

    /// stdin/stdout pretending to be the CDC endpoints.
    struct StdioTransport {
        rx: Receiver<Vec<u8>>,
        pending: VecDeque<u8>,
        closed: bool,
        out: io::Stdout,
    }

    impl CdcTransport for StdioTransport {
        type Error = SimError;

        fn receive(&mut self, buf: &mut [u8]) -> Result<usize, SimError> {
            if self.pending.is_empty() && !self.closed {
                match self.rx.try_recv() {
                    Ok(chunk) => self.pending.extend(chunk),
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => self.closed = true,
                }
            }

            let n = buf.len().min(self.pending.len());
            for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }

        fn bulk_in_ready(&self) -> bool {
            true
        }

        fn send_bulk_in(&mut self, packet: &[u8]) -> Result<usize, SimError> {
            let mut out = self.out.lock();
            out.write_all(packet).map_err(|e| SimError::Io(e.kind()))?;
            out.flush().map_err(|e| SimError::Io(e.kind()))?;
            Ok(packet.len())
        }

        fn notify_ready(&self) -> bool {
            true
        }

        fn send_notification(&mut self, _packet: &[u8]) -> Result<(), SimError> {
            Ok(())
        }
    }

    struct Stderr;

    impl core::fmt::Write for Stderr {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            io::stderr().write_all(s.as_bytes()).map_err(|_| core::fmt::Error)
        }
    }

    pub fn run() -> io::Result<()> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 64];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut transport = StdioTransport {
            rx,
            pending: VecDeque::new(),
            closed: false,
            out: io::stdout(),
        };
        let mut main_loop: MainLoop<'_, _> =
            MainLoop::new(&DEVICE, RegisterMap::new(SimulatedPorts::new()), CONFIG.who);

        let start = Instant::now();
        let mut next_pwm = 0u64;
        let mut next_debounce = 0u64;
        usb_solder_iron::rt_info!(LOG_STREAM, 0, "{} (simulator)", VERSION);

        loop {
            let now_us = start.elapsed().as_micros() as u64;

            // Timer handlers, caught up to wall time
            while next_pwm <= now_us {
                DEVICE.pwm_tick();
                next_pwm += CONFIG.pwm_tick_us;
            }
            while next_debounce <= now_us {
                DEVICE.debounce_tick(0xFF);
                next_debounce += CONFIG.debounce_tick_us;
            }

            let report = main_loop.poll_once(&mut transport, now_us as i64);
            drain_logs(&LOG_STREAM, &mut Stderr);

            if transport.closed && transport.pending.is_empty() && main_loop.tx().is_empty() {
                return Ok(());
            }
            if report.received == 0 && report.sent.is_none() {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}
