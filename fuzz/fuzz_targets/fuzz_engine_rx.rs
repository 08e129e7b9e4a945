//! Fuzz target: `Engine::process_data`
//!
//! Sends one request so a response is awaited, then feeds arbitrary
//! chunks through the receive path. The ring must never overflow its
//! capacity and the engine must never panic.
//!
//! cargo fuzz run fuzz_engine_rx

#![no_main]

use invgate::client::{ClientShared, Command, Engine, LineSettings, Protocol, ProtocolSelection, SerialTransport, TimerPort};
use invgate::config::EngineConfig;
use invgate::inverter::{InverterCmd, InverterCodec};
use libfuzzer_sys::fuzz_target;

struct Sink;

impl SerialTransport for Sink {
    type Error = ();

    fn configure(&mut self, _line: &LineSettings) -> Result<(), ()> {
        Ok(())
    }

    fn write(&mut self, _frame: &[u8]) -> Result<(), ()> {
        Ok(())
    }
}

#[derive(Default)]
struct Idle(Option<u32>);

impl TimerPort for Idle {
    fn arm(&mut self, ms: u32) {
        self.0 = Some(ms);
    }

    fn disarm(&mut self) {
        self.0 = None;
    }

    fn remaining_ms(&self) -> Option<u32> {
        self.0
    }
}

static SHARED: ClientShared = ClientShared::new(ProtocolSelection::Index(0));

fuzz_target!(|data: &[u8]| {
    let id = InverterCmd::Qpigs.id();
    let proto = Protocol::new("rs232-2400", LineSettings::n81(2400), Box::new(InverterCodec::new()))
        .with_handler(id, |_| {});
    let Ok(mut engine) = Engine::<Sink, Idle>::new(&SHARED, vec![proto], Sink, Idle::default(), EngineConfig::default())
    else {
        return;
    };
    let _ = engine.add_one_shot(id, b"QPIGS", 1000, 3);
    engine.handle(Command::Tick);

    for chunk in data.chunks(97) {
        let summary = engine.process_data(chunk);
        assert!(engine.ring().len() <= engine.ring().capacity());
        assert!(summary.dispatched <= 1);
    }
});
