//! Protocol plugin contract.
//!
//! A [`Protocol`] bundles the line settings of a serial dialect, a
//! [`FrameCodec`] that turns request payloads into wire frames and
//! recognises response frames in a byte stream, and a table of handlers
//! keyed by message id. The engine never interprets payload bytes itself.

use heapless::Vec as HVec;
use log::warn;

use super::{MAX_PACKET_LEN, MsgId};

/// Outcome of one parse call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// A complete, valid frame was decoded.
    Ok,
    /// No complete frame yet; feed more bytes.
    NoPacket,
    /// A delimited frame failed its checksum.
    InvalidCrc,
    /// The device answered with a negative acknowledgement.
    Rejected,
    /// A valid frame arrived for a different request than the awaited one.
    Unexpected,
    /// A checksum-valid frame whose body has the wrong shape.
    Malformed,
}

/// Result of parsing a prefix of the input.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Bytes the caller may discard. Never exceeds the input length.
    pub consumed: usize,
    pub status: ParseStatus,
    /// Id the frame answers. Codecs that cannot tell echo the expected id.
    pub rsp_id: MsgId,
    /// Decoded body for `Ok` and `Rejected` frames.
    pub payload: HVec<u8, MAX_PACKET_LEN>,
}

impl ParseOutcome {
    /// Nothing recognised; `consumed` bytes may be dropped as noise.
    pub fn no_packet(consumed: usize, expected: MsgId) -> Self {
        Self::status(consumed, ParseStatus::NoPacket, expected)
    }

    pub fn status(consumed: usize, status: ParseStatus, rsp_id: MsgId) -> Self {
        Self {
            consumed,
            status,
            rsp_id,
            payload: HVec::new(),
        }
    }
}

/// Wire codec of one serial dialect.
pub trait FrameCodec: Send {
    /// Look for one frame at the start of `input`.
    ///
    /// Must be re-invocable on partial data: a prefix that cannot be
    /// decoded yet is left unconsumed.
    fn parse(&mut self, expected: MsgId, input: &[u8]) -> ParseOutcome;

    /// Build the complete wire frame for a request.
    fn serialize(&self, id: MsgId, payload: &[u8]) -> Vec<u8>;
}

/// Serial parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// UART line settings required by a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl LineSettings {
    /// 8N1 at the given baud rate.
    pub const fn n81(baud: u32) -> Self {
        Self {
            baud,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

/// Callback for a decoded response payload.
pub type Handler = Box<dyn FnMut(&[u8]) + Send>;

/// A pluggable serial dialect.
pub struct Protocol {
    pub name: &'static str,
    pub line: LineSettings,
    pub codec: Box<dyn FrameCodec>,
    handlers: Vec<(MsgId, Handler)>,
}

impl Protocol {
    pub fn new(name: &'static str, line: LineSettings, codec: Box<dyn FrameCodec>) -> Self {
        Self {
            name,
            line,
            codec,
            handlers: Vec::new(),
        }
    }

    /// Register `handler` for responses to `id`. A later registration for
    /// the same id replaces the earlier one.
    pub fn with_handler(mut self, id: MsgId, handler: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.push((id, Box::new(handler)));
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Invoke the handler registered for `id`. Returns whether one ran.
    pub fn dispatch(&mut self, id: MsgId, payload: &[u8]) -> bool {
        match self.handlers.iter_mut().find(|(h, _)| *h == id) {
            Some((_, handler)) => {
                handler(payload);
                true
            }
            None => {
                warn!("SC_RX: no handler for {} msg {:#x}", self.name, id);
                false
            }
        }
    }
}

/// Which protocol the client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolSelection {
    /// Index into the protocol table.
    Index(u8),
    /// Probe every protocol until one yields a valid frame.
    Auto,
}

impl ProtocolSelection {
    /// Raw sentinel for [`ProtocolSelection::Auto`].
    pub const AUTO_RAW: u8 = 0xFF;

    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Index(i) => i,
            Self::Auto => Self::AUTO_RAW,
        }
    }

    pub const fn from_raw(raw: u8) -> Self {
        if raw == Self::AUTO_RAW {
            Self::Auto
        } else {
            Self::Index(raw)
        }
    }

    /// Valid against a table of `count` protocols.
    pub fn is_valid(self, count: usize) -> bool {
        match self {
            Self::Index(i) => (i as usize) < count,
            Self::Auto => count > 0,
        }
    }
}
