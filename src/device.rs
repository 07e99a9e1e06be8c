//! Device state and the main poll loop.
//!
//! # Architecture
//!
//! ```text
//! Timer / GPIO handlers               DeviceState                Main loop
//! ─────────────────────               ───────────                ─────────
//! pwm_tick()      ──advance counter──▶ pwm, power ◀── advance() ── press
//! debounce_tick() ──sample input────▶ button    ─── consume_press ─┘
//! raise(id)       ──fetch_or────────▶ events    ─── drain_one ───▶ TX ring
//! ```
//!
//! Handlers only touch atomics. Formatting, register access and USB traffic
//! all happen in [`MainLoop::poll_once`].

use crate::config::{DeviceConfig, BUTTON_MASK};
use crate::debounce::Debouncer;
use crate::event_latch::{InterruptLatch, InterruptSource};
use crate::heater::{HeaterPwm, PowerLevels, PwmEdge};
use crate::interpreter::Interpreter;
use crate::log_globals::LOG_STREAM;
use crate::registers::RegisterBus;
use crate::transport::{BulkInPump, CdcTransport, ClassRequests, SerialStateNotifier, SetupReply};
use crate::tx_ring::{TxRing, MAX_PACKET, TX_BUFFER_SIZE};

/// State shared between interrupt handlers and the main loop.
pub struct DeviceState {
    pub events: InterruptLatch,
    pub button: Debouncer,
    pub power: PowerLevels,
    pub pwm: HeaterPwm,
}

impl DeviceState {
    pub const fn new(power_steps: [u8; crate::config::PWR_STEPS_LEN]) -> Self {
        Self {
            events: InterruptLatch::new(),
            button: Debouncer::new(),
            power: PowerLevels::new(power_steps),
            pwm: HeaterPwm::new(),
        }
    }

    /// PWM timer overflow.
    #[inline]
    pub fn pwm_tick(&self) -> Option<PwmEdge> {
        self.pwm.tick(self.power.threshold())
    }

    /// Debounce timer tick with the raw (active-low) input byte.
    #[inline]
    pub fn debounce_tick(&self, raw: u8) {
        self.button.tick(raw);
    }

    /// Report an interrupt to the host.
    #[inline]
    pub fn raise(&self, source: InterruptSource) {
        self.events.raise_source(source);
    }
}

/// Global device state.
pub static DEVICE: DeviceState = DeviceState::new(DeviceConfig::DEFAULT.power_steps);

/// What one loop iteration did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Host bytes fed to the interpreter.
    pub received: usize,
    /// Length of the bulk-in packet sent, if any.
    pub sent: Option<usize>,
    /// Interrupt event reported to the host.
    pub event: Option<u8>,
    /// New power index after a button press.
    pub power: Option<usize>,
    /// A serial-state part went out.
    pub notified: bool,
}

/// Cooperative main loop.
pub struct MainLoop<'s, B: RegisterBus, const N: usize = TX_BUFFER_SIZE> {
    state: &'s DeviceState,
    interpreter: Interpreter,
    tx: TxRing<N>,
    pump: BulkInPump,
    notifier: SerialStateNotifier,
    class: ClassRequests,
    bus: B,
}

impl<'s, B: RegisterBus, const N: usize> MainLoop<'s, B, N> {
    pub fn new(state: &'s DeviceState, bus: B, who: &'static str) -> Self {
        Self {
            state,
            interpreter: Interpreter::new(who),
            tx: TxRing::new(),
            pump: BulkInPump::new(),
            notifier: SerialStateNotifier::new(),
            class: ClassRequests::new(),
            bus,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn tx(&self) -> &TxRing<N> {
        &self.tx
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn class_requests(&mut self) -> &mut ClassRequests {
        &mut self.class
    }

    /// Class SETUP request from the USB stack.
    pub fn setup(&mut self, request: u8, host_to_device: bool) -> SetupReply {
        self.class
            .setup(request, host_to_device, &mut self.pump, &mut self.notifier)
    }

    /// One iteration: receive, transmit, one event, one press, notify.
    ///
    /// Transport errors are logged and skipped. Unsent bytes stay queued
    /// and go out on a later iteration.
    pub fn poll_once<T: CdcTransport>(&mut self, transport: &mut T, now_us: i64) -> PollReport {
        let mut report = PollReport::default();

        // 1. Host bytes
        let mut rx = [0u8; MAX_PACKET];
        match transport.receive(&mut rx) {
            Ok(n) => {
                let n = n.min(rx.len());
                if n > 0 {
                    self.interpreter.feed(&rx[..n], &mut self.bus, &self.tx, now_us);
                }
                report.received = n;
            }
            Err(e) => crate::rt_warn!(LOG_STREAM, now_us, "usb rx: {:?}", e),
        }

        // 2. One bulk-in packet
        match self.pump.pump(&self.tx, transport) {
            Ok(sent) => report.sent = sent,
            Err(e) => crate::rt_warn!(LOG_STREAM, now_us, "usb tx: {:?}", e),
        }

        // 3. One interrupt event
        report.event = self.state.events.drain_one(&self.tx);

        // 4. One button press
        if self.state.button.consume_press(BUTTON_MASK) != 0 {
            let index = self.state.power.advance();
            crate::rt_info!(
                LOG_STREAM,
                now_us,
                "power level {} (threshold {:02X})",
                index,
                self.state.power.threshold()
            );
            report.power = Some(index);
        }

        // 5. Serial-state notification
        match self.notifier.poll(transport) {
            Ok(sent) => report.notified = sent,
            Err(e) => crate::rt_warn!(LOG_STREAM, now_us, "usb notify: {:?}", e),
        }

        report
    }
}
