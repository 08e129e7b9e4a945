//! Serial client worker thread.
//!
//! One thread owns the [`Engine`] and drives two futures on an
//! `edge-executor`: the command loop, which wakes as soon as a producer
//! enqueues, and the timer task, which sleeps on the `async-io-mini`
//! reactor until expiry or until the engine re-arms it.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────┐
//!  │  Worker thread ("sc", APP core)                      │
//!  │  ┌────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                  │  │
//!  │  │  ┌────────────────────┐  ┌──────────────────┐  │  │
//!  │  │  │ Command loop       │  │ Timer task       │  │  │
//!  │  │  │ queue.receive() ─▶ │  │ sleep / re-arm ─▶│  │  │
//!  │  │  │ Engine::handle     │  │ post(Tick)       │  │  │
//!  │  │  └────────────────────┘  └──────────────────┘  │  │
//!  │  └────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────┘
//! ```

use log::{error, info};

use super::commands::ClientShared;
use super::engine::Engine;
use super::protocol::Protocol;
use super::timer::{self, SignalTimer, TimerPort};
use super::transport::SerialTransport;
use crate::config::EngineConfig;
use crate::drivers::task_pin::{self, Core};
use crate::error::{Error, Result};

/// Build the engine and start the worker thread.
pub fn spawn<T>(
    shared: &'static ClientShared,
    protocols: Vec<Protocol>,
    transport: T,
    timer: SignalTimer,
    config: EngineConfig,
) -> Result<std::thread::JoinHandle<()>>
where
    T: SerialTransport + Send + 'static,
{
    let priority = config.worker_priority;
    let stack_kb = config.worker_stack_kb;
    let engine: Engine<T, SignalTimer> = Engine::new(shared, protocols, transport, timer, config)?;

    task_pin::spawn_on_core(Core::App, priority, stack_kb, "sc\0", move || run(shared, engine)).map_err(|e| {
        error!("SC: worker spawn failed: {}", e);
        Error::Init("worker thread spawn failed")
    })
}

async fn command_loop<T: SerialTransport, M: TimerPort, const N: usize>(
    shared: &'static ClientShared,
    mut engine: Engine<T, M, N>,
) {
    loop {
        let cmd = shared.next().await;
        engine.handle(cmd);
    }
}

/// Worker thread body.
fn run<T: SerialTransport, M: TimerPort, const N: usize>(shared: &'static ClientShared, engine: Engine<T, M, N>) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    executor.spawn(timer::run(shared)).detach();
    executor.spawn(command_loop(shared, engine)).detach();

    info!("SC: worker started");

    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}
