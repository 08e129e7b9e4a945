//! Half-duplex serial request/response client.
//!
//! Multiplexes one-shot and periodic requests over a single serial line
//! using one software timer, and decodes the inbound byte stream through a
//! pluggable [`protocol::Protocol`].
//!
//! ```text
//!  ┌──────────────┐  send / send_periodic / remove_periodic
//!  │ SerialClient │─────────────────────────────┐
//!  └──────────────┘                             ▼
//!  ┌──────────────┐  ProcessData        ┌────────────────┐
//!  │  UART RX     │────────────────────▶│ command queue  │
//!  └──────────────┘                     └───────┬────────┘
//!  ┌──────────────┐  Tick                       │
//!  │ timer task   │─────────────────────────────┤
//!  └──────▲───────┘                             ▼
//!         │            ┌───────────────────────────────────────────┐
//!         └── arm ─────│ Engine (worker thread)                    │
//!                      │  Scheduler ─ RequestTable   RingBuffer    │
//!                      │      │                          │         │
//!                      │      ▼ transmit                 ▼ parse   │
//!                      │  SerialTransport        FrameCodec ─▶ ack │
//!                      │                               └▶ handler  │
//!                      └───────────────────────────────────────────┘
//! ```

pub mod api;
pub mod commands;
pub mod engine;
pub mod protocol;
pub mod requests;
pub mod ringbuf;
pub mod rx;
pub mod scheduler;
pub mod timer;
pub mod transport;
mod worker;

/// Request / response message id. Opaque to the engine.
pub type MsgId = u16;

/// Largest frame the parser looks at in one pass.
pub const MAX_PACKET_LEN: usize = 256;

/// Receive ring capacity.
pub const RING_LEN: usize = 2 * MAX_PACKET_LEN;

/// Request table capacity.
pub const MAX_REQUESTS: usize = 8;

/// Command queue depth.
pub const QUEUE_DEPTH: usize = 8;

pub use api::{SerialClient, init};
pub use commands::{ClientShared, Command};
pub use engine::Engine;
pub use protocol::{FrameCodec, LineSettings, Parity, ParseOutcome, ParseStatus, Protocol, ProtocolSelection};
pub use rx::RxSummary;
pub use timer::TimerPort;
pub use transport::SerialTransport;
