//! Mock transport and timer for integration tests.
//!
//! Both record every call so tests can assert on the full transmission and
//! timer history without a UART or a running worker.

use std::sync::{Arc, Mutex};

use invgate::client::{
    ClientShared, Command, Engine, LineSettings, MsgId, Protocol, ProtocolSelection, SerialTransport, TimerPort,
};
use invgate::config::EngineConfig;
use invgate::inverter::{InverterCmd, InverterCodec};

pub const QPIGS: MsgId = InverterCmd::Qpigs.id();
pub const QMOD: MsgId = InverterCmd::Qmod.id();

// ── MockTransport ─────────────────────────────────────────────

#[derive(Default, Clone)]
pub struct MockTransport {
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub line: Option<LineSettings>,
    /// Reject the next write.
    pub fail_next: bool,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl SerialTransport for MockTransport {
    type Error = &'static str;

    fn configure(&mut self, line: &LineSettings) -> Result<(), Self::Error> {
        self.line = Some(*line);
        Ok(())
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        if std::mem::take(&mut self.fail_next) {
            return Err("tx busy");
        }
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}

// ── MockTimer ─────────────────────────────────────────────────

/// Timer that never runs on its own: tests fire it explicitly.
#[derive(Default)]
pub struct MockTimer {
    pub armed: Option<u32>,
    pub arms: Vec<u32>,
}

impl TimerPort for MockTimer {
    fn arm(&mut self, ms: u32) {
        self.armed = Some(ms);
        self.arms.push(ms);
    }

    fn disarm(&mut self) {
        self.armed = None;
    }

    fn remaining_ms(&self) -> Option<u32> {
        self.armed
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub type TestEngine = Engine<MockTransport, MockTimer>;

/// Responses seen by handlers, in order.
pub type Seen = Arc<Mutex<Vec<(MsgId, Vec<u8>)>>>;

pub fn shared(selection: ProtocolSelection) -> &'static ClientShared {
    Box::leak(Box::new(ClientShared::new(selection)))
}

/// Inverter protocol whose QPIGS and QMOD handlers record what they get.
pub fn recording_protocol() -> (Protocol, Seen) {
    let seen: Seen = Arc::default();
    let a = seen.clone();
    let b = seen.clone();
    let proto = Protocol::new("rs232-2400", LineSettings::n81(2400), Box::new(InverterCodec::new()))
        .with_handler(QPIGS, move |d| a.lock().unwrap().push((QPIGS, d.to_vec())))
        .with_handler(QMOD, move |d| b.lock().unwrap().push((QMOD, d.to_vec())));
    (proto, seen)
}

pub fn engine_with(shared: &'static ClientShared, protocols: Vec<Protocol>) -> TestEngine {
    Engine::new(shared, protocols, MockTransport::new(), MockTimer::default(), EngineConfig::default()).unwrap()
}

/// Engine speaking the recording inverter protocol.
pub fn engine() -> (TestEngine, Seen) {
    let (proto, seen) = recording_protocol();
    (engine_with(shared(ProtocolSelection::Index(0)), vec![proto]), seen)
}

/// Let the armed timer expire and deliver the tick.
pub fn fire(engine: &mut TestEngine) {
    engine.timer_mut().armed = None;
    engine.handle(Command::Tick);
}
