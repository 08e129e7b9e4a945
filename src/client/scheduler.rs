//! Earliest-deadline-first scheduling over one timer.
//!
//! Each active request carries `elapsed_ms`, the time charged since its last
//! transmission. Its deadline is `interval - elapsed`. Time is charged
//! up front: arming the timer for `d` ms immediately adds `d` to every
//! active request, trusting the timer to fire on time. The creation kick is
//! the only arm that is not charged.
//!
//! ```text
//!   add ──▶ kick(2000) ──┐
//!                        ▼
//!   Tick ──▶ due()? ── Later(d) ──▶ rearm(d) ─────────────┐
//!              │                                          │
//!              └── Now(slot) ──▶ transmit ──▶ on_sent ──▶ rearm_after_send
//!                                   │
//!                                   └─ write failed ──▶ rearm(500)
//! ```

use log::{info, warn};

use super::MsgId;
use super::requests::{Policy, Request, RequestTable};
use super::timer::TimerPort;
use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Result of looking for the next request to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// Nothing is active.
    Nothing,
    /// The earliest request is due in this many milliseconds.
    Later(u32),
    /// Send this slot now.
    Now(usize),
}

/// Request table plus the timer that drives it.
pub struct Scheduler<M: TimerPort, const N: usize> {
    table: RequestTable<N>,
    timer: M,
    config: EngineConfig,
}

impl<M: TimerPort, const N: usize> Scheduler<M, N> {
    pub fn new(timer: M, config: EngineConfig) -> Self {
        Self {
            table: RequestTable::new(),
            timer,
            config,
        }
    }

    pub fn table(&self) -> &RequestTable<N> {
        &self.table
    }

    pub fn timer(&self) -> &M {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut M {
        &mut self.timer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Creation ─────────────────────────────────────────────

    /// Add a one-shot request. Returns its slot.
    pub fn add_one_shot(&mut self, id: MsgId, frame: Box<[u8]>, timeout_ms: u32, max_retries: u8) -> Result<usize> {
        let slot = self.free_slot()?;
        let elapsed = timeout_ms as i64 - slot as i64 * self.config.one_shot_stagger_ms as i64;
        self.kick();
        self.table
            .insert(slot, Request::one_shot(id, frame, timeout_ms, max_retries, elapsed));
        info!(
            "SC_TX: add rq[{}] cmd={:#x} retries={} timeout={}",
            slot, id, max_retries, timeout_ms
        );
        Ok(slot)
    }

    /// Add a periodic request. Returns its slot.
    pub fn add_periodic(&mut self, id: MsgId, frame: Box<[u8]>, period_ms: u32) -> Result<usize> {
        if period_ms <= 1 {
            return Err(Error::InvalidPeriod);
        }
        let slot = self.free_slot()?;
        let elapsed = period_ms as i64 - (slot as i64 + 1) * self.config.periodic_stagger_ms as i64;
        self.kick();
        self.table
            .insert(slot, Request::periodic(id, frame, period_ms, elapsed));
        info!("SC_TX: add rq[{}] cmd={:#x} period={}", slot, id, period_ms);
        Ok(slot)
    }

    fn free_slot(&self) -> Result<usize> {
        self.table.free_slot().ok_or_else(|| {
            warn!("SC_TX: no free request slots");
            Error::TableFull
        })
    }

    /// Make the timer fire within the kick delay.
    ///
    /// A timer that fires sooner is left alone. A later one is shortened,
    /// and the part of its arm that will not elapse is refunded.
    fn kick(&mut self) {
        let kick = self.config.kick_delay_ms;
        match self.timer.remaining_ms() {
            Some(left) if left <= kick => {}
            Some(left) => {
                self.table.advance(-(left as i64));
                self.timer.arm(kick);
            }
            None => self.timer.arm(kick),
        }
    }

    // ── Transmission pass ────────────────────────────────────

    /// Pick what to do on a timer tick.
    pub fn due(&self) -> Due {
        match self.table.earliest() {
            None => Due::Nothing,
            Some((slot, deadline)) if deadline <= self.config.due_threshold_ms as i64 => Due::Now(slot),
            Some((_, deadline)) => Due::Later(deadline.min(u32::MAX as i64) as u32),
        }
    }

    pub fn frame(&self, slot: usize) -> Option<(MsgId, &[u8])> {
        self.table.get(slot).map(|rq| (rq.id, &rq.frame[..]))
    }

    /// Arm the timer for `delay_ms` and charge it to every active request.
    pub fn rearm(&mut self, delay_ms: u32) {
        self.timer.arm(delay_ms);
        self.table.advance(delay_ms as i64);
    }

    /// Apply the retry policy after `slot` was transmitted.
    pub fn on_sent(&mut self, slot: usize) {
        let give_up_after = self.config.periodic_give_up_after;
        let grace = self.config.response_grace_ms as i64;
        let Some(rq) = self.table.get_mut(slot) else {
            return;
        };
        rq.retries = rq.retries.saturating_add(1);

        match rq.policy {
            Policy::OneShot { max_retries } => {
                rq.elapsed_ms = 0;
                if rq.retries > max_retries {
                    warn!(
                        "SC: no rsp for rq[{}]={:#x} after {} retries",
                        slot, rq.id, rq.retries
                    );
                    self.table.deactivate(slot);
                }
            }
            Policy::Periodic => {
                if rq.retries > give_up_after {
                    warn!(
                        "SC: no rsp for periodic rq[{}]={:#x} after {} retries",
                        slot, rq.id, rq.retries
                    );
                    rq.elapsed_ms = 0;
                    rq.retries = 0;
                } else {
                    // retry once the response grace has passed
                    rq.elapsed_ms -= grace;
                }
            }
        }
    }

    /// Rearm for the next deadline, waiting at least the response grace.
    pub fn rearm_after_send(&mut self) {
        match self.table.earliest() {
            Some((_, deadline)) => {
                let delay = deadline.max(self.config.response_grace_ms as i64);
                self.rearm(delay.min(u32::MAX as i64) as u32);
            }
            None => info!("SC: no more rq to send"),
        }
    }

    // ── Acknowledgement and removal ──────────────────────────

    /// A response for `id` arrived. Resets the matching request and retires
    /// it if it is a one-shot. Returns the slot that matched.
    pub fn ack(&mut self, id: MsgId) -> Option<usize> {
        let slot = self.table.find_active(id)?;
        let rq = self.table.get_mut(slot)?;
        rq.elapsed_ms = 0;
        rq.retries = 0;
        if let Policy::OneShot { .. } = rq.policy {
            info!("SC_RX: rq[{}]={:#x} satisfied", slot, id);
            self.table.deactivate(slot);
        }
        Some(slot)
    }

    /// Remove the active periodic request `id`. Returns its former slot.
    pub fn remove_periodic(&mut self, id: MsgId) -> Result<usize> {
        let slot = self.table.find_periodic(id).ok_or(Error::NotFound)?;
        info!("SC_TX: remove periodic rq[{}] cmd={:#x}", slot, id);
        self.table.deactivate(slot);
        if self.table.active_count() == 0 {
            self.timer.disarm();
        }
        Ok(slot)
    }
}
