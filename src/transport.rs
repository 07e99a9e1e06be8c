//! USB CDC transport glue.
//!
//! The USB stack itself (enumeration, descriptors, endpoint handling) is
//! behind [`CdcTransport`]. This module owns the flow-control rules on top:
//!
//! - bulk-in carries at most [`MAX_PACKET`] bytes per transaction
//! - a full packet that empties the TX ring is followed by a zero-length
//!   packet so the host sees the end of the transfer
//! - after the host sets the control line state, the notification endpoint
//!   sends the serial-state record (8 bytes, then 2 bytes)

use crate::tx_ring::{TxRing, MAX_PACKET};

/// CDC class request codes.
pub mod request {
    pub const SEND_ENCAPSULATED_COMMAND: u8 = 0x00;
    pub const GET_ENCAPSULATED_RESPONSE: u8 = 0x01;
    pub const SET_LINE_CODING: u8 = 0x20;
    pub const GET_LINE_CODING: u8 = 0x21;
    pub const SET_CONTROL_LINE_STATE: u8 = 0x22;
    pub const SEND_BREAK: u8 = 0x23;
}

/// Byte channel to the host.
pub trait CdcTransport {
    type Error: core::fmt::Debug;

    /// Copy pending host→device bytes into `buf`. Returns 0 when idle.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Bulk-in endpoint can take a packet.
    fn bulk_in_ready(&self) -> bool;

    /// Queue one bulk-in packet (may be empty).
    ///
    /// Returns how many bytes the endpoint accepted. Bytes not accepted stay
    /// in the TX ring and are offered again.
    fn send_bulk_in(&mut self, packet: &[u8]) -> Result<usize, Self::Error>;

    /// Notification endpoint can take a packet.
    fn notify_ready(&self) -> bool;

    /// Queue one notification packet.
    fn send_notification(&mut self, packet: &[u8]) -> Result<(), Self::Error>;
}

/// Moves TX ring bytes to the bulk-in endpoint.
#[derive(Debug, Default)]
pub struct BulkInPump {
    send_empty_frame: bool,
}

impl BulkInPump {
    pub const fn new() -> Self {
        Self {
            send_empty_frame: false,
        }
    }

    /// A zero-length terminator is owed to the host.
    #[inline]
    pub fn terminator_pending(&self) -> bool {
        self.send_empty_frame
    }

    /// Owe the host a (possibly empty) packet, used after host-to-device
    /// class requests.
    #[inline]
    pub fn arm_terminator(&mut self) {
        self.send_empty_frame = true;
    }

    /// Send at most one packet. Returns the number of bytes sent, `None` if
    /// nothing was sent.
    ///
    /// Bytes leave the ring only once the transport accepted them, so a
    /// failed or refused send is retried on the next call.
    pub fn pump<T, const N: usize>(&mut self, tx: &TxRing<N>, transport: &mut T) -> Result<Option<usize>, T::Error>
    where
        T: CdcTransport,
    {
        if !transport.bulk_in_ready() || (tx.is_empty() && !self.send_empty_frame) {
            return Ok(None);
        }

        let mut packet = [0u8; MAX_PACKET];
        let chunk = tx.peek(&mut packet);
        let accepted = transport.send_bulk_in(&packet[..chunk.len])?.min(chunk.len);

        if chunk.len > 0 && accepted == 0 {
            return Ok(None);
        }
        tx.consume(accepted);

        self.send_empty_frame = accepted == MAX_PACKET && tx.is_empty();
        Ok(Some(accepted))
    }
}

/// Serial-state notification record: `bmRequestType`, `SERIAL_STATE`,
/// wValue, wIndex, wLength = 2, then the state bits (DCD | DSR).
pub const SERIAL_STATE_NOTIFICATION: [u8; 10] = [0xA1, 0x20, 0, 0, 0, 0, 2, 0, 3, 0];

/// Two-step serial-state notifier on the interrupt endpoint.
#[derive(Debug, Default)]
pub struct SerialStateNotifier {
    /// 2 = header pending, 1 = state bits pending, 0 = idle.
    pending: u8,
}

impl SerialStateNotifier {
    pub const fn new() -> Self {
        Self { pending: 0 }
    }

    /// Host opened the port. Ignored while a notification is in flight.
    pub fn arm(&mut self) {
        if self.pending == 0 {
            self.pending = 2;
        }
    }

    #[inline]
    pub fn pending(&self) -> u8 {
        self.pending
    }

    /// Send the next part if the endpoint is ready. The counter only moves
    /// on a successful send.
    pub fn poll<T: CdcTransport>(&mut self, transport: &mut T) -> Result<bool, T::Error> {
        if self.pending == 0 || !transport.notify_ready() {
            return Ok(false);
        }

        let part = if self.pending == 2 {
            &SERIAL_STATE_NOTIFICATION[..8]
        } else {
            &SERIAL_STATE_NOTIFICATION[8..]
        };
        transport.send_notification(part)?;
        self.pending -= 1;
        Ok(true)
    }
}

/// Line coding record (baud rate, stop bits, parity, data bits).
///
/// The device has no UART behind the port; the record is stored and
/// echoed back so terminal programs are satisfied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineCoding(pub [u8; 7]);

impl LineCoding {
    pub fn baud_rate(&self) -> u32 {
        u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

/// Class request bookkeeping shared by the USB stack adapter.
#[derive(Debug, Default)]
pub struct ClassRequests {
    pub line_coding: LineCoding,
}

/// Result of a class SETUP request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupReply {
    /// Data stage handled through [`ClassRequests::line_coding`].
    DataStage,
    /// No data stage.
    NoData,
}

impl ClassRequests {
    pub const fn new() -> Self {
        Self {
            line_coding: LineCoding([0; 7]),
        }
    }

    /// Handle a class SETUP request.
    pub fn setup(
        &mut self,
        request: u8,
        host_to_device: bool,
        pump: &mut BulkInPump,
        notifier: &mut SerialStateNotifier,
    ) -> SetupReply {
        if request == request::GET_LINE_CODING || request == request::SET_LINE_CODING {
            return SetupReply::DataStage;
        }

        if request == request::SET_CONTROL_LINE_STATE {
            notifier.arm();
        }
        if host_to_device {
            pump.arm_terminator();
        }
        SetupReply::NoData
    }

    /// SET_LINE_CODING data stage.
    pub fn write_line_coding(&mut self, data: &[u8]) {
        let len = data.len().min(7);
        self.line_coding.0[..len].copy_from_slice(&data[..len]);
    }

    /// GET_LINE_CODING data stage.
    pub fn read_line_coding(&self) -> [u8; 7] {
        self.line_coding.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Loopback {
        bulk: Vec<Vec<u8>>,
        notes: Vec<Vec<u8>>,
        busy: bool,
        fail_bulk: u32,
        accept: usize,
    }

    impl Default for Loopback {
        fn default() -> Self {
            Self {
                bulk: Vec::new(),
                notes: Vec::new(),
                busy: false,
                fail_bulk: 0,
                accept: MAX_PACKET,
            }
        }
    }

    impl CdcTransport for Loopback {
        type Error = ();

        fn receive(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
            Ok(0)
        }
        fn bulk_in_ready(&self) -> bool {
            !self.busy
        }
        fn send_bulk_in(&mut self, packet: &[u8]) -> Result<usize, ()> {
            if self.fail_bulk > 0 {
                self.fail_bulk -= 1;
                return Err(());
            }
            let n = packet.len().min(self.accept);
            self.bulk.push(packet[..n].to_vec());
            Ok(n)
        }
        fn notify_ready(&self) -> bool {
            !self.busy
        }
        fn send_notification(&mut self, packet: &[u8]) -> Result<(), ()> {
            self.notes.push(packet.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_exact_packet_gets_terminator() {
        let tx = TxRing::<32>::new();
        let mut usb = Loopback::default();
        let mut pump = BulkInPump::new();

        tx.push_slice(b"01234567");
        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(8)));
        assert!(pump.terminator_pending());
        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(0)));
        assert_eq!(pump.pump(&tx, &mut usb), Ok(None));

        assert_eq!(usb.bulk, vec![b"01234567".to_vec(), vec![]]);
    }

    #[test]
    fn test_short_packet_needs_no_terminator() {
        let tx = TxRing::<32>::new();
        let mut usb = Loopback::default();
        let mut pump = BulkInPump::new();

        tx.push_slice(b"0123456789");
        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(8)));
        assert!(!pump.terminator_pending());
        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(2)));
        assert_eq!(pump.pump(&tx, &mut usb), Ok(None));
    }

    #[test]
    fn test_pump_waits_for_endpoint() {
        let tx = TxRing::<32>::new();
        let mut usb = Loopback { busy: true, ..Default::default() };
        let mut pump = BulkInPump::new();

        tx.push_slice(b"ab");
        assert_eq!(pump.pump(&tx, &mut usb), Ok(None));
        assert_eq!(tx.len(), 2);
    }

    #[test]
    fn test_failed_send_keeps_bytes() {
        let tx = TxRing::<32>::new();
        let mut usb = Loopback { fail_bulk: 1, ..Default::default() };
        let mut pump = BulkInPump::new();

        tx.push_slice(b"5A\r\n");
        assert_eq!(pump.pump(&tx, &mut usb), Err(()));
        assert_eq!(tx.len(), 4);

        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(4)));
        assert_eq!(pump.pump(&tx, &mut usb), Ok(None));
        assert_eq!(usb.bulk, vec![b"5A\r\n".to_vec()]);
    }

    #[test]
    fn test_partial_accept_resends_rest() {
        let tx = TxRing::<32>::new();
        let mut usb = Loopback { accept: 3, ..Default::default() };
        let mut pump = BulkInPump::new();

        tx.push_slice(b"01234567");
        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(3)));
        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(3)));
        assert_eq!(pump.pump(&tx, &mut usb), Ok(Some(2)));
        // Short packets end the transfer, no terminator
        assert_eq!(pump.pump(&tx, &mut usb), Ok(None));

        let sent: Vec<u8> = usb.bulk.concat();
        assert_eq!(sent, b"01234567".to_vec());
    }

    #[test]
    fn test_full_fifo_sends_nothing() {
        let tx = TxRing::<32>::new();
        let mut usb = Loopback { accept: 0, ..Default::default() };
        let mut pump = BulkInPump::new();

        tx.push_slice(b"ab");
        assert_eq!(pump.pump(&tx, &mut usb), Ok(None));
        assert_eq!(tx.len(), 2);
    }

    #[test]
    fn test_serial_state_sent_in_two_parts() {
        let mut usb = Loopback::default();
        let mut notifier = SerialStateNotifier::new();

        notifier.arm();
        assert_eq!(notifier.poll(&mut usb), Ok(true));
        notifier.arm(); // in flight, ignored
        assert_eq!(notifier.poll(&mut usb), Ok(true));
        assert_eq!(notifier.poll(&mut usb), Ok(false));

        assert_eq!(usb.notes[0], SERIAL_STATE_NOTIFICATION[..8].to_vec());
        assert_eq!(usb.notes[1], vec![3, 0]);
        assert_eq!(usb.notes.len(), 2);
    }

    #[test]
    fn test_setup_requests() {
        let mut class = ClassRequests::new();
        let mut pump = BulkInPump::new();
        let mut notifier = SerialStateNotifier::new();

        assert_eq!(
            class.setup(request::SET_LINE_CODING, true, &mut pump, &mut notifier),
            SetupReply::DataStage
        );
        assert!(!pump.terminator_pending());

        class.write_line_coding(&[0x00, 0xC2, 0x01, 0x00, 0, 0, 8]);
        assert_eq!(class.line_coding.baud_rate(), 115200);
        assert_eq!(class.read_line_coding()[6], 8);

        assert_eq!(
            class.setup(request::SET_CONTROL_LINE_STATE, true, &mut pump, &mut notifier),
            SetupReply::NoData
        );
        assert_eq!(notifier.pending(), 2);
        assert!(pump.terminator_pending());
    }
}
