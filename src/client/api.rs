//! Public client API.
//!
//! [`SerialClient`] is a cheap `Copy` handle: every call only validates its
//! arguments and enqueues a command for the worker. Request-level outcomes
//! (slot assignment, table full, not found) are logged by the worker.

use log::{error, info};

use super::commands::{ClientShared, Command, packet};
use super::protocol::{Protocol, ProtocolSelection};
use super::timer::SignalTimer;
use super::transport::SerialTransport;
use super::{MAX_PACKET_LEN, MsgId, worker};
use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Handle to a running serial client.
#[derive(Clone, Copy)]
pub struct SerialClient {
    shared: &'static ClientShared,
    protocol_count: usize,
}

impl SerialClient {
    /// Wrap shared state whose worker is driven elsewhere.
    pub fn new(shared: &'static ClientShared, protocol_count: usize) -> Self {
        Self {
            shared,
            protocol_count,
        }
    }

    /// Queue a one-shot request, retried up to `retries` times.
    pub fn send(&self, id: MsgId, payload: &[u8], timeout_ms: u32, retries: u8) -> Result<()> {
        self.shared.post(Command::AddOneShot {
            id,
            payload: packet(payload)?,
            timeout_ms,
            retries,
        })
    }

    /// Queue a periodic request sent every `period_ms`.
    pub fn send_periodic(&self, id: MsgId, payload: &[u8], period_ms: u32) -> Result<()> {
        if period_ms <= 1 {
            return Err(Error::InvalidPeriod);
        }
        self.shared.post(Command::AddPeriodic {
            id,
            payload: packet(payload)?,
            period_ms,
        })
    }

    /// Queue removal of the periodic request `id`.
    pub fn remove_periodic(&self, id: MsgId) -> Result<()> {
        self.shared.post(Command::RemovePeriodic { id })
    }

    /// Switch the active protocol. Takes effect from the next command.
    pub fn set_protocol(&self, selection: ProtocolSelection) -> Result<()> {
        if !selection.is_valid(self.protocol_count) {
            return Err(Error::InvalidProtocol(selection.to_raw()));
        }
        info!("SC: protocol set to {:?}", selection);
        self.shared.store_selection(selection);
        Ok(())
    }

    pub fn protocol(&self) -> ProtocolSelection {
        self.shared.selection()
    }

    /// Receive path: hand bytes from the serial line to the worker.
    ///
    /// Never blocks. A chunk that finds the queue full is dropped, logged
    /// and counted in [`ClientShared::rx_dropped`].
    pub fn on_rx(&self, data: &[u8]) {
        for chunk in data.chunks(MAX_PACKET_LEN) {
            // chunks never exceed the packet capacity
            let Ok(payload) = packet(chunk) else {
                continue;
            };
            if self.shared.post(Command::ProcessData(payload)).is_err() {
                let total = self.shared.count_rx_drop(chunk.len());
                error!("SC_RX: queue full, dropped {} rx bytes (total {})", chunk.len(), total);
            }
        }
    }
}

/// Start a serial client.
///
/// Validates the selection, applies the line settings of the selected
/// protocol (the first one while auto-detecting), spawns the worker thread
/// and binds the transport's receive path to the returned handle.
pub fn init<T>(
    shared: &'static ClientShared,
    selection: ProtocolSelection,
    protocols: Vec<Protocol>,
    mut transport: T,
    config: EngineConfig,
) -> Result<SerialClient>
where
    T: SerialTransport + Send + 'static,
{
    if !selection.is_valid(protocols.len()) {
        return Err(Error::InvalidProtocol(selection.to_raw()));
    }
    config.validate()?;
    shared.store_selection(selection);

    let line = match selection {
        ProtocolSelection::Index(i) => protocols[i as usize].line,
        ProtocolSelection::Auto => protocols[0].line,
    };
    transport.configure(&line).map_err(|e| {
        log::error!("SC: line configuration failed: {:?}", e);
        Error::Init("serial line configuration failed")
    })?;

    let client = SerialClient::new(shared, protocols.len());
    transport.bind_rx(client).map_err(|e| {
        log::error!("SC: rx bind failed: {:?}", e);
        Error::Init("serial rx bind failed")
    })?;

    let timer = SignalTimer::new(shared);
    worker::spawn(shared, protocols, transport, timer, config)?;

    info!("SC: client started (baud={}, protocol={:?})", line.baud, selection);
    Ok(client)
}
