//! Serial client configuration parameters
//!
//! Timing constants of the scheduling engine, tuned for the turnaround
//! time of a 2400 baud RS-232 inverter link, plus worker thread settings.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A request whose deadline is above this is not sent yet.
pub const DUE_THRESHOLD_MS: u32 = 50;
/// Wait at least this long for a response before the next transmission.
/// Also the floor for every rearm after a send.
pub const RESPONSE_GRACE_MS: u32 = 100;
/// Rearm delay after the transport rejected a write.
pub const SEND_RETRY_BACKOFF_MS: u32 = 500;
/// A new request makes the timer fire within this delay.
pub const KICK_DELAY_MS: u32 = 2000;
/// One-shot requests start `slot × stagger` ahead of their timeout.
pub const ONE_SHOT_STAGGER_MS: u32 = 100;
/// Periodic requests start `(slot + 1) × stagger` ahead of their period.
pub const PERIODIC_STAGGER_MS: u32 = 500;
/// Periodic requests stop retrying for the current cycle above this.
pub const PERIODIC_GIVE_UP_AFTER: u8 = 2;
/// Bound on parse rounds per received chunk.
pub const PARSE_ROUNDS: u8 = 8;

/// Scheduling engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Scheduling ---
    pub due_threshold_ms: u32,
    pub response_grace_ms: u32,
    pub send_retry_backoff_ms: u32,
    pub kick_delay_ms: u32,
    pub one_shot_stagger_ms: u32,
    pub periodic_stagger_ms: u32,
    pub periodic_give_up_after: u8,

    // --- Parsing ---
    pub parse_rounds: u8,

    // --- Worker thread ---
    /// FreeRTOS priority of the worker thread
    pub worker_priority: u8,
    /// Worker stack size in KiB
    pub worker_stack_kb: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            due_threshold_ms: DUE_THRESHOLD_MS,
            response_grace_ms: RESPONSE_GRACE_MS,
            send_retry_backoff_ms: SEND_RETRY_BACKOFF_MS,
            kick_delay_ms: KICK_DELAY_MS,
            one_shot_stagger_ms: ONE_SHOT_STAGGER_MS,
            periodic_stagger_ms: PERIODIC_STAGGER_MS,
            periodic_give_up_after: PERIODIC_GIVE_UP_AFTER,

            parse_rounds: PARSE_ROUNDS,

            worker_priority: 5,
            worker_stack_kb: 8,
        }
    }
}

impl EngineConfig {
    /// Reject settings that would stall the worker or spin the timer.
    pub fn validate(&self) -> Result<()> {
        if self.response_grace_ms == 0 {
            return Err(Error::Init("response grace must be non-zero"));
        }
        if self.due_threshold_ms >= self.response_grace_ms {
            return Err(Error::Init("due threshold must be below response grace"));
        }
        if self.parse_rounds == 0 {
            return Err(Error::Init("parse rounds must be non-zero"));
        }
        if self.kick_delay_ms == 0 || self.worker_stack_kb == 0 {
            return Err(Error::Init("kick delay and worker stack must be non-zero"));
        }
        Ok(())
    }
}
