//! Public API validation and engine edge cases.

use invgate::client::{
    ClientShared, Command, Engine, FrameCodec, LineSettings, MAX_PACKET_LEN, MAX_REQUESTS, MsgId, ParseOutcome, ParseStatus, Protocol,
    ProtocolSelection, QUEUE_DEPTH, SerialClient,
};
use invgate::config::EngineConfig;
use invgate::error::Error;
use invgate::inverter::codec::response_frame;

use crate::mocks::{
    MockTimer, MockTransport, QMOD, QPIGS, TestEngine, engine, engine_with, fire, recording_protocol, shared,
};

fn client() -> (&'static ClientShared, SerialClient) {
    let s = shared(ProtocolSelection::Index(0));
    (s, SerialClient::new(s, 1))
}

// ── Argument validation ───────────────────────────────────────

#[test]
fn periodic_needs_period_above_one() {
    let (s, c) = client();
    assert_eq!(c.send_periodic(QMOD, b"QMOD", 1), Err(Error::InvalidPeriod));
    assert_eq!(c.send_periodic(QMOD, b"QMOD", 0), Err(Error::InvalidPeriod));
    assert_eq!(s.pending(), 0);
    assert_eq!(c.send_periodic(QMOD, b"QMOD", 2), Ok(()));
}

#[test]
fn oversized_payload_is_refused() {
    let (s, c) = client();
    let big = vec![b'Q'; MAX_PACKET_LEN + 1];
    assert_eq!(c.send(QPIGS, &big, 1000, 0), Err(Error::PayloadTooLarge));
    assert_eq!(s.pending(), 0);
}

#[test]
fn protocol_selection_is_validated() {
    let (s, c) = client();
    assert_eq!(c.set_protocol(ProtocolSelection::Index(1)), Err(Error::InvalidProtocol(1)));
    assert_eq!(c.protocol(), ProtocolSelection::Index(0));
    c.set_protocol(ProtocolSelection::Auto).unwrap();
    assert_eq!(s.selection(), ProtocolSelection::Auto);
}

#[test]
fn full_queue_reports_instead_of_blocking() {
    let (_, c) = client();
    for _ in 0..QUEUE_DEPTH {
        c.send(QPIGS, b"QPIGS", 1000, 0).unwrap();
    }
    assert_eq!(c.send(QPIGS, b"QPIGS", 1000, 0), Err(Error::QueueFull));
    assert_eq!(c.remove_periodic(QPIGS), Err(Error::QueueFull));
}

#[test]
fn received_bytes_are_dropped_when_queue_is_full() {
    let (s, c) = client();
    for _ in 0..QUEUE_DEPTH {
        s.post(Command::Tick).unwrap();
    }

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        c.on_rx(b"abc");
        done_tx.send(()).unwrap();
    });
    assert!(
        done_rx.recv_timeout(std::time::Duration::from_millis(500)).is_ok(),
        "on_rx stalled on a full queue"
    );
    assert_eq!(s.pending(), QUEUE_DEPTH);
    assert_eq!(s.rx_dropped(), 3);

    // room again: the next chunk goes through
    s.try_next().unwrap();
    c.on_rx(b"de");
    assert_eq!(s.pending(), QUEUE_DEPTH);
    assert_eq!(s.rx_dropped(), 3);
}

#[test]
fn received_bytes_are_chunked_into_packets() {
    let (s, c) = client();
    let data = vec![0xAA; MAX_PACKET_LEN + 44];
    c.on_rx(&data);
    match (s.try_next(), s.try_next()) {
        (Some(Command::ProcessData(a)), Some(Command::ProcessData(b))) => {
            assert_eq!(a.len(), MAX_PACKET_LEN);
            assert_eq!(b.len(), 44);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(s.try_next(), None);
}

#[test]
fn queued_commands_reach_the_engine() {
    let (mut eng, _) = engine();
    let (s, c) = client();
    c.send(QPIGS, b"QPIGS", 1000, 1).unwrap();
    c.send_periodic(QMOD, b"QMOD", 5000).unwrap();
    c.remove_periodic(0x77).unwrap();
    while let Some(cmd) = s.try_next() {
        eng.handle(cmd);
    }
    assert_eq!(eng.requests().active_count(), 2);
    assert_eq!(eng.requests().find_active(QPIGS), Some(0));
    assert_eq!(eng.requests().find_periodic(QMOD), Some(1));
}

// ── Table capacity and removal ────────────────────────────────

#[test]
fn table_full_is_reported() {
    let (mut eng, _) = engine();
    for i in 0..MAX_REQUESTS {
        eng.add_one_shot(i as MsgId, b"QPI", 1000, 0).unwrap();
    }
    assert_eq!(eng.add_one_shot(99, b"QPI", 1000, 0), Err(Error::TableFull));
    assert_eq!(eng.add_periodic(99, b"QPI", 1000), Err(Error::TableFull));
    assert_eq!(eng.requests().active_count(), MAX_REQUESTS);
}

#[test]
fn removing_last_periodic_disarms_timer() {
    let (mut eng, _) = engine();
    eng.add_periodic(QMOD, b"QMOD", 5000).unwrap();
    assert_eq!(eng.remove_periodic(QPIGS), Err(Error::NotFound));
    assert!(eng.timer().armed.is_some());

    assert_eq!(eng.remove_periodic(QMOD), Ok(0));
    assert_eq!(eng.requests().active_count(), 0);
    assert_eq!(eng.timer().armed, None);
    // a second removal finds nothing
    assert_eq!(eng.remove_periodic(QMOD), Err(Error::NotFound));
}

#[test]
fn one_shot_cannot_be_removed_as_periodic() {
    let (mut eng, _) = engine();
    eng.add_one_shot(QPIGS, b"QPIGS", 1000, 0).unwrap();
    assert_eq!(eng.remove_periodic(QPIGS), Err(Error::NotFound));
    assert_eq!(eng.requests().active_count(), 1);
}

#[test]
fn queued_removal_of_unknown_id_leaves_table_alone() {
    let (mut eng, _) = engine();
    eng.add_periodic(QMOD, b"QMOD", 5000).unwrap();
    eng.handle(Command::RemovePeriodic { id: 0x77 });
    eng.handle(Command::RemovePeriodic { id: QPIGS });
    assert_eq!(eng.requests().find_periodic(QMOD), Some(0));
    assert_eq!(eng.timer().armed, Some(2000));

    eng.handle(Command::RemovePeriodic { id: QMOD });
    assert_eq!(eng.requests().active_count(), 0);
    assert_eq!(eng.timer().armed, None);
}

// ── Transmission failures ─────────────────────────────────────

#[test]
fn failed_write_backs_off_without_charging_a_retry() {
    let (mut eng, _) = engine();
    eng.add_one_shot(QPIGS, b"QPIGS", 1000, 1).unwrap();
    eng.transport_mut().fail_next = true;

    fire(&mut eng);
    assert_eq!(eng.transport().count(), 0);
    assert_eq!(eng.timer().arms.last(), Some(&500));
    let rq = eng.requests().get(0).unwrap();
    assert_eq!(rq.retries, 0);

    fire(&mut eng);
    assert_eq!(eng.transport().count(), 1);
    assert_eq!(eng.requests().get(0).unwrap().retries, 1);
}

// ── Negative and malformed answers ────────────────────────────

#[test]
fn nak_retires_one_shot_without_dispatch() {
    let (mut eng, seen) = engine();
    eng.add_one_shot(QMOD, b"QMOD", 1000, 3).unwrap();
    fire(&mut eng);

    let summary = eng.process_data(&response_frame(b"NAK"));
    assert_eq!(summary.last_status, Some(ParseStatus::Rejected));
    assert_eq!(eng.requests().active_count(), 0);
    assert_eq!(eng.awaited(), None);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn malformed_answer_still_acknowledges() {
    let (mut eng, seen) = engine();
    eng.add_one_shot(QMOD, b"QMOD", 1000, 3).unwrap();
    fire(&mut eng);

    let summary = eng.process_data(&response_frame(b"BL"));
    assert_eq!(summary.last_status, Some(ParseStatus::Malformed));
    assert_eq!(eng.requests().active_count(), 0);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn bytes_are_kept_while_nothing_is_awaited() {
    let (mut eng, seen) = engine();
    let frame = response_frame(b"B");
    let summary = eng.process_data(&frame);
    assert_eq!(summary.consumed, 0);
    assert_eq!(eng.ring().len(), frame.len());
    assert!(seen.lock().unwrap().is_empty());
}

// ── Auto-detection ────────────────────────────────────────────

/// A dialect that never recognises anything.
struct Mute;

impl FrameCodec for Mute {
    fn parse(&mut self, expected: MsgId, _input: &[u8]) -> ParseOutcome {
        ParseOutcome::no_packet(0, expected)
    }

    fn serialize(&self, _id: MsgId, payload: &[u8]) -> Vec<u8> {
        payload.to_vec()
    }
}

#[test]
fn auto_detect_locks_first_protocol_with_valid_frame() {
    let s = shared(ProtocolSelection::Auto);
    let mute = Protocol::new("mute", LineSettings::n81(9600), Box::new(Mute));
    let (inverter, seen) = recording_protocol();
    let mut eng = engine_with(s, vec![mute, inverter]);

    eng.add_periodic(QMOD, b"QMOD", 600_000).unwrap();
    fire(&mut eng);
    fire(&mut eng);
    // requests go out in the first protocol's framing while detecting
    assert_eq!(eng.transport().frames(), vec![b"QMOD".to_vec()]);

    let summary = eng.process_data(&response_frame(b"B"));
    assert_eq!(summary.last_status, Some(ParseStatus::Ok));
    assert_eq!(s.selection(), ProtocolSelection::Index(1));
    assert_eq!(*seen.lock().unwrap(), vec![(QMOD, b"B".to_vec())]);
}

#[test]
fn engine_rejects_out_of_range_selection() {
    let s = shared(ProtocolSelection::Index(2));
    let (proto, _) = recording_protocol();
    let result: Result<TestEngine, Error> = Engine::new(
        s,
        vec![proto],
        MockTransport::new(),
        MockTimer::default(),
        EngineConfig::default(),
    );
    assert!(matches!(result, Err(Error::InvalidProtocol(2))));
}
