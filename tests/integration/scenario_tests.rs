//! End-to-end scheduling and parsing traces against the engine.
//!
//! Each test drives the engine the way the worker would, one command at a
//! time, and checks the exact transmission and timer history.

use invgate::client::{Command, ParseStatus};
use invgate::inverter::codec::response_frame;

use crate::mocks::{QMOD, QPIGS, engine, fire};

const QPIGS_FRAME: &[u8] = b"QPIGS\xB7\xA9\r";
const QMOD_FRAME: &[u8] = b"QMOD\x49\xC1\r";

// ── One-shot with retries ─────────────────────────────────────

#[test]
fn one_shot_is_sent_retries_plus_one_times_then_dropped() {
    let (mut eng, _) = engine();
    eng.handle(Command::AddOneShot {
        id: QPIGS,
        payload: heapless::Vec::from_slice(b"QPIGS").unwrap(),
        timeout_ms: 1000,
        retries: 2,
    });
    assert_eq!(eng.requests().active_count(), 1);
    assert_eq!(eng.timer().arms, vec![2000]);

    fire(&mut eng);
    fire(&mut eng);
    fire(&mut eng);

    assert_eq!(eng.transport().count(), 3);
    assert!(eng.transport().frames().iter().all(|f| f == QPIGS_FRAME));
    assert_eq!(eng.timer().arms, vec![2000, 1000, 1000]);
    assert_eq!(eng.requests().active_count(), 0);

    // nothing left: further ticks send nothing
    fire(&mut eng);
    assert_eq!(eng.transport().count(), 3);
}

// ── Periodic give-up and EDF order ────────────────────────────

#[test]
fn unanswered_periodic_gives_up_for_the_cycle_and_yields() {
    let (mut eng, _) = engine();
    let fast = eng.add_periodic(QMOD, b"QMOD", 5000).unwrap();
    let slow = eng.add_periodic(QPIGS, b"QPIGS", 15_000).unwrap();
    assert_eq!((fast, slow), (0, 1));
    assert_eq!(eng.requests().get(0).unwrap().deadline_ms(), 500);
    assert_eq!(eng.requests().get(1).unwrap().deadline_ms(), 1000);
    // the second kick leaves the pending timer alone
    assert_eq!(eng.timer().arms, vec![2000]);

    // kick expiry: nothing due yet, wait for the fast one
    fire(&mut eng);
    assert_eq!(eng.transport().count(), 0);

    // three tries of the fast request, 100 ms apart
    fire(&mut eng);
    fire(&mut eng);
    fire(&mut eng);
    assert_eq!(eng.transport().count(), 3);
    let rq = eng.requests().get(0).unwrap();
    assert_eq!(rq.retries, 0, "counter resets after giving up");
    assert_eq!(rq.deadline_ms(), 4700);
    assert!(eng.requests().is_active(0));

    // the slow request is next
    fire(&mut eng);
    let frames = eng.transport().frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(&frames[..3], &[QMOD_FRAME.to_vec(), QMOD_FRAME.to_vec(), QMOD_FRAME.to_vec()]);
    assert_eq!(frames[3], QPIGS_FRAME);

    assert_eq!(eng.timer().arms, vec![2000, 500, 100, 100, 300, 100]);

    // the slow request gives up too, then the fast one's wait runs out
    fire(&mut eng);
    fire(&mut eng);
    assert_eq!(eng.transport().count(), 6);
    assert_eq!(eng.timer().armed, Some(4500));
    assert_eq!(eng.requests().get(0).unwrap().deadline_ms(), 0);
    assert_eq!(eng.requests().get(1).unwrap().deadline_ms(), 10_500);

    fire(&mut eng);
    let frames = eng.transport().frames();
    assert_eq!(frames.len(), 7);
    assert_eq!(frames[6], QMOD_FRAME);
    assert_eq!(frames.iter().filter(|f| f.as_slice() == QMOD_FRAME).count(), 4);
    assert_eq!(
        eng.timer().arms,
        vec![2000, 500, 100, 100, 300, 100, 100, 100, 4500, 100]
    );
}

// ── Response handling ─────────────────────────────────────────

#[test]
fn valid_response_acks_and_dispatches() {
    let (mut eng, seen) = engine();
    eng.add_periodic(QMOD, b"QMOD", 600_000).unwrap();
    fire(&mut eng);
    fire(&mut eng);
    assert_eq!(eng.awaited(), Some(QMOD));
    assert_eq!(eng.requests().get(0).unwrap().retries, 1);

    let frame = response_frame(b"B");
    let summary = eng.process_data(&frame);

    assert_eq!(summary.last_status, Some(ParseStatus::Ok));
    assert_eq!(summary.consumed, frame.len());
    assert_eq!(summary.dispatched, 1);
    assert_eq!(eng.awaited(), None);
    let rq = eng.requests().get(0).unwrap();
    assert_eq!((rq.retries, rq.elapsed_ms), (0, 0));
    assert!(eng.ring().is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![(QMOD, b"B".to_vec())]);
}

#[test]
fn corrupted_response_is_dropped_without_ack() {
    let (mut eng, seen) = engine();
    eng.add_periodic(QMOD, b"QMOD", 600_000).unwrap();
    fire(&mut eng);
    fire(&mut eng);

    let mut frame = response_frame(b"B");
    let crc_lo = frame.len() - 2;
    frame[crc_lo] ^= 0x40;
    let summary = eng.process_data(&frame);

    assert_eq!(summary.last_status, Some(ParseStatus::InvalidCrc));
    assert_eq!(summary.dispatched, 0);
    assert_eq!(eng.awaited(), Some(QMOD));
    assert_eq!(eng.requests().get(0).unwrap().retries, 1);
    assert!(eng.ring().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn response_split_across_chunks_is_reassembled() {
    let (mut eng, seen) = engine();
    eng.add_periodic(QMOD, b"QMOD", 600_000).unwrap();
    fire(&mut eng);
    fire(&mut eng);

    let frame = response_frame(b"L");
    let first = eng.process_data(&frame[..3]);
    assert_eq!(first.last_status, None);
    assert_eq!(eng.ring().len(), 3);

    let second = eng.process_data(&frame[3..]);
    assert_eq!(second.last_status, Some(ParseStatus::Ok));
    assert_eq!(*seen.lock().unwrap(), vec![(QMOD, b"L".to_vec())]);
}

#[test]
fn noise_before_response_is_discarded() {
    let (mut eng, seen) = engine();
    eng.add_periodic(QMOD, b"QMOD", 600_000).unwrap();
    fire(&mut eng);
    fire(&mut eng);

    let mut data = b"\x00\xffgarbage".to_vec();
    data.extend_from_slice(&response_frame(b"B"));
    let summary = eng.process_data(&data);

    assert_eq!(summary.last_status, Some(ParseStatus::Ok));
    assert_eq!(summary.consumed, data.len());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn late_bytes_are_discarded_at_next_transmission() {
    let (mut eng, seen) = engine();
    eng.add_periodic(QMOD, b"QMOD", 600_000).unwrap();
    // a response nobody is waiting for stays buffered
    eng.process_data(&response_frame(b"L"));
    assert!(!eng.ring().is_empty());

    fire(&mut eng);
    fire(&mut eng);
    assert!(eng.ring().is_empty());

    eng.process_data(&response_frame(b"B"));
    assert_eq!(*seen.lock().unwrap(), vec![(QMOD, b"B".to_vec())]);
}
