//! Unified error type for the serial client.
//!
//! Every variant is `Copy` so results can be passed across the command
//! queue boundary and logged without allocation. Frame-level problems
//! (bad checksum, NAK, malformed body) are not errors here: they are parse
//! statuses handled inside the worker.

use core::fmt;

/// Every fallible client operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// All request slots are occupied.
    TableFull,
    /// The worker command queue is full; the command was dropped.
    QueueFull,
    /// No active periodic request carries the given id.
    NotFound,
    /// Protocol index is neither valid nor the auto-detect sentinel.
    InvalidProtocol(u8),
    /// Periodic requests need a period above 1 ms.
    InvalidPeriod,
    /// Payload does not fit into one queued command.
    PayloadTooLarge,
    /// Initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableFull => write!(f, "no free request slots"),
            Self::QueueFull => write!(f, "command queue full"),
            Self::NotFound => write!(f, "request not found"),
            Self::InvalidProtocol(idx) => write!(f, "invalid protocol index {idx}"),
            Self::InvalidPeriod => write!(f, "period must be above 1 ms"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
