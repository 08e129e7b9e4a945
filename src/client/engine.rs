//! The worker-owned engine.
//!
//! Owns everything mutable: request table, timer port, receive ring,
//! protocol table, transport and the awaited response id. Exactly one
//! thread drives it through [`Engine::handle`], so none of that state needs
//! a lock.

use log::{debug, error, info, warn};

use super::commands::{ClientShared, Command};
use super::protocol::{Protocol, ProtocolSelection};
use super::requests::RequestTable;
use super::ringbuf::RingBuffer;
use super::scheduler::{Due, Scheduler};
use super::timer::TimerPort;
use super::transport::SerialTransport;
use super::{MAX_REQUESTS, MsgId, RING_LEN};
use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Serial client engine over transport `T` and timer `M` with `N` slots.
pub struct Engine<T: SerialTransport, M: TimerPort, const N: usize = MAX_REQUESTS> {
    pub(super) shared: &'static ClientShared,
    pub(super) protocols: Vec<Protocol>,
    pub(super) transport: T,
    pub(super) scheduler: Scheduler<M, N>,
    pub(super) ring: RingBuffer<RING_LEN>,
    pub(super) awaited: Option<MsgId>,
}

impl<T: SerialTransport, M: TimerPort, const N: usize> Engine<T, M, N> {
    pub fn new(
        shared: &'static ClientShared,
        protocols: Vec<Protocol>,
        transport: T,
        timer: M,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let selection = shared.selection();
        if !selection.is_valid(protocols.len()) {
            return Err(Error::InvalidProtocol(selection.to_raw()));
        }
        info!(
            "SC: initialized protocol={:?} ({} available, {} slots)",
            selection,
            protocols.len(),
            N
        );
        Ok(Self {
            shared,
            protocols,
            transport,
            scheduler: Scheduler::new(timer, config),
            ring: RingBuffer::new(),
            awaited: None,
        })
    }

    /// Execute one queued command.
    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::AddOneShot {
                id,
                payload,
                timeout_ms,
                retries,
            } => {
                if let Err(e) = self.add_one_shot(id, &payload, timeout_ms, retries) {
                    error!("SC: add rq {:#x} failed: {}", id, e);
                }
            }
            Command::AddPeriodic { id, payload, period_ms } => {
                if let Err(e) = self.add_periodic(id, &payload, period_ms) {
                    error!("SC: add periodic rq {:#x} failed: {}", id, e);
                }
            }
            Command::RemovePeriodic { id } => {
                if let Err(e) = self.remove_periodic(id) {
                    warn!("SC: remove periodic rq {:#x} failed: {}", id, e);
                }
            }
            Command::ProcessData(data) => {
                self.process_data(&data);
            }
            Command::Tick => self.on_timer(),
        }
    }

    // ── Request management ───────────────────────────────────

    /// Serialize and schedule a one-shot request. Returns its slot.
    pub fn add_one_shot(&mut self, id: MsgId, payload: &[u8], timeout_ms: u32, retries: u8) -> Result<usize> {
        let frame = self.serialize(id, payload)?;
        self.scheduler.add_one_shot(id, frame, timeout_ms, retries)
    }

    /// Serialize and schedule a periodic request. Returns its slot.
    pub fn add_periodic(&mut self, id: MsgId, payload: &[u8], period_ms: u32) -> Result<usize> {
        if period_ms <= 1 {
            return Err(Error::InvalidPeriod);
        }
        let frame = self.serialize(id, payload)?;
        self.scheduler.add_periodic(id, frame, period_ms)
    }

    pub fn remove_periodic(&mut self, id: MsgId) -> Result<usize> {
        self.scheduler.remove_periodic(id)
    }

    /// Serialize with the selected protocol. While auto-detecting, requests
    /// go out in the first protocol's framing.
    fn serialize(&self, id: MsgId, payload: &[u8]) -> Result<Box<[u8]>> {
        if self.scheduler.table().free_slot().is_none() {
            return Err(Error::TableFull);
        }
        let idx = match self.shared.selection() {
            ProtocolSelection::Index(i) => i as usize,
            ProtocolSelection::Auto => 0,
        };
        let proto = self
            .protocols
            .get(idx)
            .ok_or(Error::InvalidProtocol(idx as u8))?;
        Ok(proto.codec.serialize(id, payload).into_boxed_slice())
    }

    // ── Transmission ─────────────────────────────────────────

    /// Timer expiry: send the earliest due request or rearm for it.
    pub fn on_timer(&mut self) {
        match self.scheduler.due() {
            Due::Nothing => debug!("SC: tick with no active rq"),
            Due::Later(ms) => self.scheduler.rearm(ms),
            Due::Now(slot) => self.transmit(slot),
        }
    }

    fn transmit(&mut self, slot: usize) {
        let Some((id, frame)) = self.scheduler.frame(slot) else {
            return;
        };
        // half-duplex: nothing received before this request can answer it
        if !self.ring.is_empty() {
            debug!("SC_TX: dropping {} stale rx bytes", self.ring.len());
            self.ring.flush();
        }
        self.awaited = Some(id);
        match self.transport.write(frame) {
            Ok(()) => {
                debug!("SC_TX: sent rq[{}]={:#x} ({} B)", slot, id, frame.len());
                self.scheduler.on_sent(slot);
                self.scheduler.rearm_after_send();
            }
            Err(e) => {
                error!("SC_TX: failed to send rq[{}]={:#x} err={:?}", slot, id, e);
                let backoff = self.scheduler.config().send_retry_backoff_ms;
                self.scheduler.rearm(backoff);
            }
        }
    }

    /// A response for `id` arrived.
    pub(super) fn ack(&mut self, id: MsgId) {
        if self.awaited == Some(id) {
            self.awaited = None;
        }
        self.scheduler.ack(id);
    }

    // ── Accessors ────────────────────────────────────────────

    /// Id of the last transmitted request still waiting for its response.
    pub fn awaited(&self) -> Option<MsgId> {
        self.awaited
    }

    pub fn requests(&self) -> &RequestTable<N> {
        self.scheduler.table()
    }

    pub fn ring(&self) -> &RingBuffer<RING_LEN> {
        &self.ring
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn timer(&self) -> &M {
        self.scheduler.timer()
    }

    pub fn timer_mut(&mut self) -> &mut M {
        self.scheduler.timer_mut()
    }

    pub fn selection(&self) -> ProtocolSelection {
        self.shared.selection()
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }
}
