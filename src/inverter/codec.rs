//! Inverter RS-232 framing at 2400 baud.
//!
//! ```text
//!  request : Q P I G S  CRC_hi CRC_lo \r
//!  response: ( body...  CRC_hi CRC_lo \r      CRC over "(" + body
//!  reject  : ( N A K    CRC_hi CRC_lo \r
//! ```
//!
//! Responses carry no command id, so a valid frame is attributed to the
//! request being awaited and its body is checked against that command's
//! expected shape.
//!
//! The checksum is raw binary and may contain `(` or `\r`. The start marker
//! is searched for before the checksum bytes, and a terminator inside the
//! checksum is skipped when a later one within two bytes makes the CRC match.

use log::info;
use serde::Serialize;

use super::crc::{escaped_crc, frame_crc};
use crate::client::{FrameCodec, MsgId, ParseOutcome, ParseStatus};

/// Shortest input worth scanning: "(" + 2 CRC bytes + "\r" + one byte.
const MIN_FRAME_LEN: usize = 5;

const CRC_LEN: usize = 2;

/// Inquiry commands understood by the inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum InverterCmd {
    /// Protocol id
    Qpi = 1,
    /// Device serial / production id
    Qid = 2,
    /// Main CPU firmware version
    Qvfw = 3,
    /// Rating information
    Qpiri = 6,
    /// Device model
    Qmd = 7,
    /// Enable/disable flag status
    Qflag = 8,
    /// General status
    Qpigs = 9,
    /// Device mode
    Qmod = 10,
    /// Grid output voltage range
    Qgov = 17,
    /// Grid output frequency range
    Qgof = 18,
    /// Current fault code
    Qpicf = 30,
    /// Warning status
    Qpiws = 41,
}

impl InverterCmd {
    pub const ALL: [Self; 12] = [
        Self::Qpi,
        Self::Qid,
        Self::Qvfw,
        Self::Qpiri,
        Self::Qmd,
        Self::Qflag,
        Self::Qpigs,
        Self::Qmod,
        Self::Qgov,
        Self::Qgof,
        Self::Qpicf,
        Self::Qpiws,
    ];

    pub const fn id(self) -> MsgId {
        self as MsgId
    }

    pub fn from_id(id: MsgId) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    /// ASCII request payload.
    pub const fn command(self) -> &'static [u8] {
        match self {
            Self::Qpi => b"QPI",
            Self::Qid => b"QID",
            Self::Qvfw => b"QVFW",
            Self::Qpiri => b"QPIRI",
            Self::Qmd => b"QMD",
            Self::Qflag => b"QFLAG",
            Self::Qpigs => b"QPIGS",
            Self::Qmod => b"QMOD",
            Self::Qgov => b"QGOV",
            Self::Qgof => b"QGOF",
            Self::Qpicf => b"QPICF",
            Self::Qpiws => b"QPIWS",
        }
    }

    /// Whether `body` has the length and prefix this command answers with.
    pub fn body_ok(self, body: &[u8]) -> bool {
        let len = body.len();
        match self {
            Self::Qpi => len >= 4 && body.starts_with(b"PI") && body[2..4].iter().all(u8::is_ascii_digit),
            Self::Qid => len == 14,
            Self::Qvfw => len == 14 && body.starts_with(b"VERFW:"),
            Self::Qpiri => len == 46,
            Self::Qmd => len >= 15,
            Self::Qflag => len == 11 && matches!(body[0], b'E' | b'D'),
            Self::Qpigs => len >= 106,
            Self::Qmod => len == 1,
            Self::Qgov => len >= 11,
            Self::Qgof => len >= 9,
            Self::Qpicf => len == 4,
            Self::Qpiws => true,
        }
    }
}

/// Frame counters kept by the codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    /// Delimited frames seen.
    pub packets: u32,
    pub crc_errors: u32,
    /// Frames that passed checksum and shape checks.
    pub valid: u32,
}

/// [`FrameCodec`] for the inverter protocol.
#[derive(Debug, Default)]
pub struct InverterCodec {
    stats: FrameStats,
    escape_crc: bool,
}

impl InverterCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec for firmware that bumps checksum bytes colliding with `(`,
    /// `\r` or `\n` by one, on both requests and responses.
    pub fn with_escaped_crc() -> Self {
        Self {
            escape_crc: true,
            ..Self::default()
        }
    }

    fn crc(&self, data: &[u8]) -> [u8; 2] {
        if self.escape_crc { escaped_crc(data) } else { frame_crc(data) }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    fn outcome(consumed: usize, status: ParseStatus, expected: MsgId, body: &[u8]) -> ParseOutcome {
        let mut out = ParseOutcome::status(consumed, status, expected);
        // body is bounded by the parser's peek window
        let _ = out.payload.extend_from_slice(&body[..body.len().min(out.payload.capacity())]);
        out
    }
}

impl FrameCodec for InverterCodec {
    fn parse(&mut self, expected: MsgId, input: &[u8]) -> ParseOutcome {
        if input.len() < MIN_FRAME_LEN {
            return ParseOutcome::no_packet(0, expected);
        }

        let Some(end) = input.iter().position(|&b| b == b'\r') else {
            return ParseOutcome::no_packet(pending_start(input), expected);
        };
        // the start marker closest to the checksum wins
        let Some(start) = input[..end.saturating_sub(CRC_LEN)].iter().rposition(|&b| b == b'(') else {
            return ParseOutcome::no_packet(end + 1, expected);
        };

        self.stats.packets += 1;

        let last = input.len().min(end + CRC_LEN + 1);
        let Some(end) = (end..last)
            .filter(|&e| input[e] == b'\r')
            .find(|&e| input[e - CRC_LEN..e] == self.crc(&input[start..e - CRC_LEN]))
        else {
            self.stats.crc_errors += 1;
            if self.stats.crc_errors % 10 == 0 {
                info!(
                    "INV: CRC errors={} valid={} pkt_cnt={}",
                    self.stats.crc_errors, self.stats.valid, self.stats.packets
                );
            }
            return ParseOutcome::status(end + 1, ParseStatus::InvalidCrc, expected);
        };
        let crc_at = end - CRC_LEN;
        let consumed = end + 1;

        let body = &input[start + 1..crc_at];
        if body.starts_with(b"NAK") {
            return Self::outcome(consumed, ParseStatus::Rejected, expected, body);
        }

        if let Some(cmd) = InverterCmd::from_id(expected) {
            if !cmd.body_ok(body) {
                return Self::outcome(consumed, ParseStatus::Malformed, expected, body);
            }
        }

        self.stats.valid += 1;
        Self::outcome(consumed, ParseStatus::Ok, expected, body)
    }

    fn serialize(&self, _id: MsgId, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(payload.len() + CRC_LEN + 1);
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&self.crc(payload));
        frame.push(b'\r');
        frame
    }
}

/// Where a frame still waiting for its terminator may begin: the last `(`
/// ahead of the trailing checksum bytes, else the last `(` at all.
fn pending_start(input: &[u8]) -> usize {
    input[..input.len().saturating_sub(CRC_LEN)]
        .iter()
        .rposition(|&b| b == b'(')
        .or_else(|| input.iter().rposition(|&b| b == b'('))
        .unwrap_or(input.len())
}

/// Build a response frame as the inverter would send it.
pub fn response_frame(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(body.len() + CRC_LEN + 2);
    frame.push(b'(');
    frame.extend_from_slice(body);
    let crc = frame_crc(&frame);
    frame.extend_from_slice(&crc);
    frame.push(b'\r');
    frame
}
