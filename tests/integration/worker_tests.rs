//! Full client on a real worker thread and timer task.
//!
//! Uses short kick delays so the first transmission happens within tens of
//! milliseconds; every wait is bounded.

use std::time::{Duration, Instant};

use invgate::client::{self, ProtocolSelection};
use invgate::config::EngineConfig;
use invgate::inverter::codec::response_frame;

use crate::mocks::{MockTransport, QMOD, QPIGS, recording_protocol, shared};

fn fast_config() -> EngineConfig {
    EngineConfig {
        kick_delay_ms: 20,
        periodic_stagger_ms: 20,
        ..EngineConfig::default()
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn init_configures_line_and_rejects_bad_selection() {
    let s = shared(ProtocolSelection::Index(3));
    let (proto, _) = recording_protocol();
    let result = client::init(s, ProtocolSelection::Index(3), vec![proto], MockTransport::new(), fast_config());
    assert!(result.is_err());
}

#[test]
fn one_shot_goes_out_on_the_wire() {
    let s = shared(ProtocolSelection::Index(0));
    let (proto, _) = recording_protocol();
    let transport = MockTransport::new();
    let probe = transport.clone();

    let client = client::init(s, ProtocolSelection::Index(0), vec![proto], transport, fast_config()).unwrap();
    client.send(QPIGS, b"QPIGS", 1000, 0).unwrap();

    assert!(wait_until(Duration::from_secs(2), || probe.count() == 1));
    assert_eq!(probe.frames()[0], b"QPIGS\xB7\xA9\r");
}

#[test]
fn periodic_response_reaches_handler() {
    let s = shared(ProtocolSelection::Index(0));
    let (proto, seen) = recording_protocol();
    let transport = MockTransport::new();
    let probe = transport.clone();

    let client = client::init(s, ProtocolSelection::Index(0), vec![proto], transport, fast_config()).unwrap();
    client.send_periodic(QMOD, b"QMOD", 60_000).unwrap();

    assert!(wait_until(Duration::from_secs(3), || probe.count() >= 1));
    client.on_rx(&response_frame(b"S"));

    assert!(wait_until(Duration::from_secs(2), || !seen.lock().unwrap().is_empty()));
    assert_eq!(seen.lock().unwrap()[0], (QMOD, b"S".to_vec()));
}
