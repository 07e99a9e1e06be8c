//! Interrupt event reporting and the TX ring.

use usb_solder_iron::event_latch::{InterruptLatch, InterruptSource, EVENT_MAX, EVENT_MIN};
use usb_solder_iron::transport::BulkInPump;
use usb_solder_iron::tx_ring::{TxRing, MAX_PACKET};

fn drain_all<const N: usize>(tx: &TxRing<N>) -> String {
    let mut out = Vec::new();
    let mut packet = [0u8; MAX_PACKET];
    loop {
        let chunk = tx.drain(&mut packet);
        out.extend_from_slice(&packet[..chunk.len]);
        if chunk.len == 0 {
            break;
        }
    }
    String::from_utf8(out).unwrap()
}

#[test]
fn test_repeated_raise_reports_once() {
    let latch = InterruptLatch::new();
    let tx = TxRing::<64>::new();

    for _ in 0..5 {
        latch.raise_source(InterruptSource::Timer1CompareA);
    }
    assert_eq!(latch.drain_one(&tx), Some(4));
    assert_eq!(latch.drain_one(&tx), None);
    assert_eq!(drain_all(&tx), "\\04\r\n");
}

#[test]
fn test_every_id_reported_in_order() {
    let latch = InterruptLatch::new();
    let tx = TxRing::<128>::new();

    for id in (EVENT_MIN..=EVENT_MAX).rev() {
        latch.raise(id);
    }

    let mut expected = String::new();
    for id in EVENT_MIN..=EVENT_MAX {
        assert_eq!(latch.drain_one(&tx), Some(id));
        expected.push_str(&format!("\\{:02X}\r\n", id));
    }
    assert_eq!(drain_all(&tx), expected);
}

#[test]
fn test_out_of_range_ids_ignored() {
    let latch = InterruptLatch::new();
    latch.raise(0);
    latch.raise(1);
    latch.raise(16);
    latch.raise(31);
    assert_eq!(latch.take_lowest(), None);
}

#[test]
fn test_raise_from_other_thread_survives_drain() {
    use std::sync::Arc;
    use std::thread;

    let latch = Arc::new(InterruptLatch::new());
    let handles: Vec<_> = (EVENT_MIN..=EVENT_MAX)
        .map(|id| {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                for _ in 0..100 {
                    latch.raise(id);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut seen = Vec::new();
    while let Some(id) = latch.take_lowest() {
        seen.push(id);
    }
    assert_eq!(seen, (EVENT_MIN..=EVENT_MAX).collect::<Vec<_>>());
}

#[test]
fn test_drains_never_exceed_pushes() {
    let tx = TxRing::<32>::new();
    let mut packet = [0u8; MAX_PACKET];
    let mut pushed = 0;
    let mut drained = 0;

    for round in 0..50 {
        let n = round % 11;
        for i in 0..n {
            tx.push(i as u8);
        }
        pushed += n;

        let chunk = tx.drain(&mut packet);
        assert!(chunk.len <= MAX_PACKET);
        drained += chunk.len;
        assert!(drained <= pushed);
    }
}

#[test]
fn test_terminator_only_after_exact_drain() {
    struct Sink(Vec<usize>);

    impl usb_solder_iron::CdcTransport for Sink {
        type Error = ();
        fn receive(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
            Ok(0)
        }
        fn bulk_in_ready(&self) -> bool {
            true
        }
        fn send_bulk_in(&mut self, packet: &[u8]) -> Result<usize, ()> {
            self.0.push(packet.len());
            Ok(packet.len())
        }
        fn notify_ready(&self) -> bool {
            true
        }
        fn send_notification(&mut self, _packet: &[u8]) -> Result<(), ()> {
            Ok(())
        }
    }

    for (len, expected) in [
        (7, vec![7]),
        (8, vec![8, 0]),
        (9, vec![8, 1]),
        (16, vec![8, 8, 0]),
    ] {
        let tx = TxRing::<64>::new();
        let mut pump = BulkInPump::new();
        let mut sink = Sink(Vec::new());

        tx.push_slice(&vec![b'x'; len]);
        while pump.pump(&tx, &mut sink).unwrap().is_some() {}

        assert_eq!(sink.0, expected, "payload of {} bytes", len);
    }
}
