//! Hybrid solar inverter over RS-232 at 2400 baud.
//!
//! Builds the [`Protocol`] the serial client speaks to the inverter and
//! keeps the latest decoded readings in an [`InverterState`].

pub mod codec;
pub mod crc;
pub mod status;

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde::Serialize;

use crate::client::{LineSettings, Protocol, SerialClient};
use crate::error::Result;
pub use codec::{FrameStats, InverterCmd, InverterCodec};
use status::{DeviceMode, FirmwareVersion, GeneralStatus, WarningFlags};

pub const PROTOCOL_NAME: &str = "rs232-2400";
pub const BAUD: u32 = 2400;

/// Requests polled from startup, with their periods in milliseconds.
/// The firmware version poll stops after the first answer.
pub const DEFAULT_POLLS: [(InverterCmd, u32); 4] = [
    (InverterCmd::Qvfw, 10_000),
    (InverterCmd::Qpigs, 15_000),
    (InverterCmd::Qpiws, 600_000),
    (InverterCmd::Qmod, 600_000),
];

/// Latest decoded readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InverterSnapshot {
    pub general: Option<GeneralStatus>,
    pub mode: Option<DeviceMode>,
    pub warnings: WarningFlags,
    pub firmware: Option<FirmwareVersion>,
    pub fault_code: Option<u16>,
    pub serial_number: Option<heapless::String<16>>,
    /// Responses that failed to decode.
    pub decode_errors: u32,
}

/// Shared handle to the readings, written by response handlers.
#[derive(Debug, Clone, Default)]
pub struct InverterState {
    inner: Arc<Mutex<InverterSnapshot>>,
}

impl InverterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> InverterSnapshot {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut InverterSnapshot)) {
        if let Ok(mut s) = self.inner.lock() {
            f(&mut s);
        }
    }

    fn decode_failed(&self, cmd: InverterCmd, err: &status::DecodeError) {
        warn!("INV: {:?} decode failed: {}", cmd, err);
        self.update(|s| s.decode_errors += 1);
    }
}

/// The inverter protocol with its response handlers wired to `state`.
///
/// `client` is used by handlers that adjust polling, such as dropping the
/// firmware version poll once it has been answered.
pub fn protocol(client: SerialClient, state: &InverterState) -> Protocol {
    let general = state.clone();
    let warnings = state.clone();
    let mode = state.clone();
    let firmware = state.clone();
    let fault = state.clone();
    let serial = state.clone();

    Protocol::new(PROTOCOL_NAME, LineSettings::n81(BAUD), Box::new(InverterCodec::new()))
        .with_handler(InverterCmd::Qpigs.id(), move |body| match GeneralStatus::parse(body) {
            Ok(st) => {
                if let Ok(json) = serde_json::to_string(&st) {
                    debug!("INV: status {}", json);
                }
                general.update(|s| s.general = Some(st));
            }
            Err(e) => general.decode_failed(InverterCmd::Qpigs, &e),
        })
        .with_handler(InverterCmd::Qpiws.id(), move |body| {
            let flags = WarningFlags::parse(body);
            if flags.count() > 0 {
                warn!("INV: {} warnings active ({:#x})", flags.count(), flags.0);
            }
            warnings.update(|s| s.warnings = flags);
        })
        .with_handler(InverterCmd::Qmod.id(), move |body| match DeviceMode::parse(body) {
            Ok(m) => {
                info!("INV: mode {:?}", m);
                mode.update(|s| s.mode = Some(m));
            }
            Err(e) => mode.decode_failed(InverterCmd::Qmod, &e),
        })
        .with_handler(InverterCmd::Qvfw.id(), move |body| {
            match FirmwareVersion::parse(body) {
                Ok(v) => {
                    info!("INV: firmware {}", v);
                    firmware.update(|s| s.firmware = Some(v));
                }
                Err(e) => firmware.decode_failed(InverterCmd::Qvfw, &e),
            }
            if let Err(e) = client.remove_periodic(InverterCmd::Qvfw.id()) {
                warn!("INV: could not stop firmware poll: {}", e);
            }
        })
        .with_handler(InverterCmd::Qpicf.id(), move |body| {
            let code = core::str::from_utf8(body).ok().and_then(|t| t.parse::<u16>().ok());
            match code {
                Some(c) => fault.update(|s| s.fault_code = Some(c)),
                None => fault.decode_failed(InverterCmd::Qpicf, &status::DecodeError::BadField(0)),
            }
        })
        .with_handler(InverterCmd::Qid.id(), move |body| {
            let mut id = heapless::String::new();
            for &b in body.iter().filter(|b| b.is_ascii_alphanumeric()) {
                if id.push(b as char).is_err() {
                    break;
                }
            }
            info!("INV: serial number {}", id);
            serial.update(|s| s.serial_number = Some(id));
        })
}

/// Register the [`DEFAULT_POLLS`] on `client`.
pub fn start_polling(client: &SerialClient) -> Result<()> {
    for (cmd, period_ms) in DEFAULT_POLLS {
        client.send_periodic(cmd.id(), cmd.command(), period_ms)?;
    }
    info!("INV: polling {} requests", DEFAULT_POLLS.len());
    Ok(())
}
