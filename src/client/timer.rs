//! The single scheduling timer.
//!
//! The engine talks to a [`TimerPort`]; the production port forwards
//! arm/disarm requests to an async timer task over a `Signal`. On expiry
//! the task only enqueues [`Command::Tick`]: it never touches request
//! state, so all scheduling stays on the worker.

use core::time::Duration;
use std::time::Instant;

use futures_lite::future;
use log::debug;

use super::commands::{ClientShared, Command, TimerCtl};

/// One-shot restartable timer as seen by the scheduler.
pub trait TimerPort {
    /// (Re)start the timer to fire once after `ms`.
    fn arm(&mut self, ms: u32);

    /// Stop the timer if running.
    fn disarm(&mut self);

    /// Milliseconds until expiry, or `None` when not running.
    fn remaining_ms(&self) -> Option<u32>;
}

/// [`TimerPort`] backed by the timer task of [`run`].
pub struct SignalTimer {
    shared: &'static ClientShared,
    deadline: Option<Instant>,
}

impl SignalTimer {
    pub fn new(shared: &'static ClientShared) -> Self {
        Self {
            shared,
            deadline: None,
        }
    }
}

impl TimerPort for SignalTimer {
    fn arm(&mut self, ms: u32) {
        self.deadline = Some(Instant::now() + Duration::from_millis(ms as u64));
        self.shared.timer_ctl(TimerCtl::Arm(ms));
    }

    fn disarm(&mut self) {
        self.deadline = None;
        self.shared.timer_ctl(TimerCtl::Disarm);
    }

    fn remaining_ms(&self) -> Option<u32> {
        let left = self.deadline?.checked_duration_since(Instant::now())?;
        Some(left.as_millis().min(u32::MAX as u128) as u32)
    }
}

/// Timer task. Runs on the worker executor next to the command loop.
pub async fn run(shared: &'static ClientShared) {
    let mut armed: Option<u32> = None;
    loop {
        let ctl = match armed {
            None => Some(shared.wait_timer_ctl().await),
            Some(ms) => {
                future::or(
                    async {
                        async_io_mini::Timer::after(Duration::from_millis(ms as u64)).await;
                        None
                    },
                    async { Some(shared.wait_timer_ctl().await) },
                )
                .await
            }
        };

        match ctl {
            Some(TimerCtl::Arm(ms)) => armed = Some(ms),
            Some(TimerCtl::Disarm) => armed = None,
            None => {
                armed = None;
                debug!("SC: timer expired");
                shared.post_wait(Command::Tick).await;
            }
        }
    }
}
