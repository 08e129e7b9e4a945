//! Worker command queue and the state shared with producers.
//!
//! Every mutation of the request table, ring and timer funnels through one
//! bounded queue drained by the worker. Producers are the public API, the
//! UART receive path and the timer task.
//!
//! ```text
//! ┌───────────────┐
//! │ SerialClient  │──AddOneShot / AddPeriodic / RemovePeriodic──┐
//! └───────────────┘                                             │
//! ┌───────────────┐                                             ▼
//! │  UART RX      │────────────ProcessData────────────▶ ┌──────────────┐
//! └───────────────┘                                     │    Worker    │
//! ┌───────────────┐                                     │   (Engine)   │
//! │  Timer task   │────────────Tick───────────────────▶ └──────┬───────┘
//! └───────▲───────┘                                            │
//!         └──────────────── TimerCtl::Arm / Disarm ────────────┘
//! ```

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;
use log::warn;

use super::protocol::ProtocolSelection;
use super::{MAX_PACKET_LEN, MsgId, QUEUE_DEPTH};
use crate::error::{Error, Result};

/// Bytes carried by one command.
pub type Packet = Vec<u8, MAX_PACKET_LEN>;

/// The five things the worker can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddOneShot {
        id: MsgId,
        payload: Packet,
        timeout_ms: u32,
        retries: u8,
    },
    AddPeriodic {
        id: MsgId,
        payload: Packet,
        period_ms: u32,
    },
    RemovePeriodic {
        id: MsgId,
    },
    ProcessData(Packet),
    Tick,
}

/// Control message for the timer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCtl {
    Arm(u32),
    Disarm,
}

/// State shared between the worker and every producer. Lives in a `static`.
pub struct ClientShared {
    queue: Channel<CriticalSectionRawMutex, Command, QUEUE_DEPTH>,
    timer: Signal<CriticalSectionRawMutex, TimerCtl>,
    selection: AtomicU8,
    rx_dropped: AtomicUsize,
}

impl ClientShared {
    pub const fn new(selection: ProtocolSelection) -> Self {
        Self {
            queue: Channel::new(),
            timer: Signal::new(),
            selection: AtomicU8::new(selection.to_raw()),
            rx_dropped: AtomicUsize::new(0),
        }
    }

    /// Enqueue without blocking. Safe from handlers running on the worker.
    pub fn post(&self, cmd: Command) -> Result<()> {
        self.queue.try_send(cmd).map_err(|_| {
            warn!("SC: command queue full, dropping command");
            Error::QueueFull
        })
    }

    /// Received bytes dropped because the queue was full.
    pub fn rx_dropped(&self) -> usize {
        self.rx_dropped.load(Ordering::Relaxed)
    }

    /// Returns the new total.
    pub(crate) fn count_rx_drop(&self, n: usize) -> usize {
        self.rx_dropped.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Enqueue, waiting for room.
    pub async fn post_wait(&self, cmd: Command) {
        self.queue.send(cmd).await;
    }

    pub async fn next(&self) -> Command {
        self.queue.receive().await
    }

    pub fn try_next(&self) -> Option<Command> {
        self.queue.try_receive().ok()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn selection(&self) -> ProtocolSelection {
        ProtocolSelection::from_raw(self.selection.load(Ordering::Acquire))
    }

    pub(crate) fn store_selection(&self, selection: ProtocolSelection) {
        self.selection.store(selection.to_raw(), Ordering::Release);
    }

    pub(crate) fn timer_ctl(&self, ctl: TimerCtl) {
        self.timer.signal(ctl);
    }

    pub(crate) async fn wait_timer_ctl(&self) -> TimerCtl {
        self.timer.wait().await
    }

    #[cfg(test)]
    pub(crate) fn take_timer_ctl(&self) -> Option<TimerCtl> {
        self.timer.try_take()
    }
}

/// Copy `data` into a queue packet.
pub fn packet(data: &[u8]) -> Result<Packet> {
    Vec::from_slice(data).map_err(|()| Error::PayloadTooLarge)
}
