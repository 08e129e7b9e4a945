//! Request table: a fixed arena of outstanding requests.
//!
//! A slot is active exactly while it holds a [`Request`], so the owned wire
//! frame lives and dies with the slot. All lookups are linear scans; the
//! table is small.

use log::info;

use super::MsgId;

/// Retry policy of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Sent until answered or until `max_retries` retransmissions are spent.
    OneShot { max_retries: u8 },
    /// Re-sent every period forever; gives up only for the current cycle.
    Periodic,
}

/// One outstanding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: MsgId,
    /// Serialized wire frame, ready to transmit.
    pub frame: Box<[u8]>,
    /// Timeout for one-shot requests, period for periodic ones.
    pub interval_ms: u32,
    /// Time charged since the last transmission. Exceeds `interval_ms`
    /// while the request is overdue.
    pub elapsed_ms: i64,
    /// Transmissions since the last reset.
    pub retries: u8,
    pub policy: Policy,
}

impl Request {
    pub fn one_shot(id: MsgId, frame: Box<[u8]>, timeout_ms: u32, max_retries: u8, elapsed_ms: i64) -> Self {
        Self {
            id,
            frame,
            interval_ms: timeout_ms,
            elapsed_ms,
            retries: 0,
            policy: Policy::OneShot { max_retries },
        }
    }

    pub fn periodic(id: MsgId, frame: Box<[u8]>, period_ms: u32, elapsed_ms: i64) -> Self {
        Self {
            id,
            frame,
            interval_ms: period_ms,
            elapsed_ms,
            retries: 0,
            policy: Policy::Periodic,
        }
    }

    /// Milliseconds until the request is due. Zero or negative means overdue.
    pub fn deadline_ms(&self) -> i64 {
        self.interval_ms as i64 - self.elapsed_ms
    }

    pub fn is_periodic(&self) -> bool {
        self.policy == Policy::Periodic
    }
}

/// Arena of `N` request slots.
pub struct RequestTable<const N: usize> {
    slots: [Option<Request>; N],
}

impl<const N: usize> RequestTable<N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Lowest inactive slot.
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Place `rq` into `slot`, replacing nothing.
    pub fn insert(&mut self, slot: usize, rq: Request) {
        debug_assert!(self.slots[slot].is_none());
        self.slots[slot] = Some(rq);
    }

    pub fn get(&self, slot: usize) -> Option<&Request> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Request> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    /// First active slot carrying `id`.
    pub fn find_active(&self, id: MsgId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|rq| rq.id == id))
    }

    /// First active periodic slot carrying `id`.
    pub fn find_periodic(&self, id: MsgId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|rq| rq.id == id && rq.is_periodic()))
    }

    /// Active slot with the smallest deadline; ties go to the lowest slot.
    pub fn earliest(&self) -> Option<(usize, i64)> {
        let mut best: Option<(usize, i64)> = None;
        for (i, rq) in self.iter() {
            let d = rq.deadline_ms();
            if best.is_none_or(|(_, b)| d < b) {
                best = Some((i, d));
            }
        }
        best
    }

    /// Charge `delta_ms` to every active request. Negative refunds.
    pub fn advance(&mut self, delta_ms: i64) {
        for rq in self.slots.iter_mut().flatten() {
            rq.elapsed_ms += delta_ms;
        }
    }

    /// Free `slot` and release its frame.
    pub fn deactivate(&mut self, slot: usize) -> Option<Request> {
        let rq = self.slots.get_mut(slot).and_then(Option::take);
        if let Some(rq) = &rq {
            info!("SC_TX: rq[{}]={:#x} deactivated", slot, rq.id);
        }
        rq
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Active slots with their index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Request)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|rq| (i, rq)))
    }
}

impl<const N: usize> Default for RequestTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
