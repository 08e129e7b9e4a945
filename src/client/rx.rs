//! Frame parser adapter: inbound bytes to acknowledgements and handlers.
//!
//! Received chunks are appended to the ring, then a peek of up to one
//! maximal packet is run through the protocol codec in a bounded number of
//! rounds. Consumed bytes are released from the ring at the end; an
//! incomplete tail stays buffered for the next chunk.

use log::{debug, error, info, warn};

use super::engine::Engine;
use super::protocol::{FrameCodec, ParseOutcome, ParseStatus, ProtocolSelection};
use super::timer::TimerPort;
use super::transport::SerialTransport;
use super::{MAX_PACKET_LEN, MsgId};

/// What one `process_data` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxSummary {
    /// Bytes released from the ring.
    pub consumed: usize,
    /// Status of the last definitive parse, if any.
    pub last_status: Option<ParseStatus>,
    /// Handlers invoked.
    pub dispatched: usize,
}

impl<T: SerialTransport, M: TimerPort, const N: usize> Engine<T, M, N> {
    /// Feed received bytes through the parser.
    pub fn process_data(&mut self, data: &[u8]) -> RxSummary {
        self.ring.write(data);
        let mut summary = RxSummary::default();

        if self.awaited.is_none() {
            debug!("SC_RX: no rq awaiting a rsp, keeping {} B", self.ring.len());
            return summary;
        }

        let mut buf = [0u8; MAX_PACKET_LEN];
        let len = self.ring.read(&mut buf);
        let rounds = self.scheduler.config().parse_rounds;
        let mut offset = 0usize;

        for _ in 0..rounds {
            if offset >= len {
                break;
            }
            let Some(expected) = self.awaited else {
                break;
            };
            let selection = self.shared.selection();
            let (proto, outcome) = self.parse_one(selection, expected, &buf[offset..len]);
            offset += outcome.consumed;

            match outcome.status {
                ParseStatus::NoPacket => {}
                ParseStatus::Ok if selection != ProtocolSelection::Auto && outcome.rsp_id != expected => {
                    info!("SC_RX: unexpected rsp={:#x} exp={:#x}", outcome.rsp_id, expected);
                    summary.last_status = Some(ParseStatus::Unexpected);
                }
                ParseStatus::Ok => {
                    if selection == ProtocolSelection::Auto {
                        info!("SC_RX: detected protocol '{}'", self.protocols[proto].name);
                        self.shared.store_selection(ProtocolSelection::Index(proto as u8));
                    }
                    self.ack(outcome.rsp_id);
                    if self.protocols[proto].dispatch(outcome.rsp_id, &outcome.payload) {
                        summary.dispatched += 1;
                    }
                    summary.last_status = Some(ParseStatus::Ok);
                }
                ParseStatus::Unexpected => {
                    info!("SC_RX: unexpected rsp={:#x} exp={:#x}", outcome.rsp_id, expected);
                    summary.last_status = Some(ParseStatus::Unexpected);
                }
                ParseStatus::InvalidCrc => {
                    warn!("SC_RX: CRC error rsp for rq={:#x}", expected);
                    summary.last_status = Some(ParseStatus::InvalidCrc);
                }
                ParseStatus::Rejected => {
                    info!("SC_RX: rsp={:#x} denied", expected);
                    self.ack(expected);
                    summary.last_status = Some(ParseStatus::Rejected);
                }
                ParseStatus::Malformed => {
                    error!("SC_RX: malformed packet for rq={:#x}", expected);
                    self.ack(expected);
                    summary.last_status = Some(ParseStatus::Malformed);
                }
            }

            if outcome.consumed == 0 {
                break;
            }
        }

        if offset > 0 {
            self.ring.clear(offset);
        }
        summary.consumed = offset;
        summary
    }

    /// Run one parse round. Returns the protocol index that produced the
    /// outcome. While auto-detecting every protocol is tried in order and
    /// the first definitive answer wins; if none has one, only the bytes
    /// every protocol agrees are noise are consumed.
    fn parse_one(&mut self, selection: ProtocolSelection, expected: MsgId, input: &[u8]) -> (usize, ParseOutcome) {
        let rounds = self.scheduler.config().parse_rounds;
        match selection {
            ProtocolSelection::Index(i) => {
                let idx = i as usize;
                (idx, run_codec(self.protocols[idx].codec.as_mut(), rounds, expected, input))
            }
            ProtocolSelection::Auto => {
                let mut fallback: Option<(usize, ParseOutcome)> = None;
                for (idx, proto) in self.protocols.iter_mut().enumerate() {
                    let outcome = run_codec(proto.codec.as_mut(), rounds, expected, input);
                    if outcome.status != ParseStatus::NoPacket {
                        return (idx, outcome);
                    }
                    if fallback.as_ref().is_none_or(|(_, f)| outcome.consumed < f.consumed) {
                        fallback = Some((idx, outcome));
                    }
                }
                fallback.unwrap_or_else(|| (0, ParseOutcome::no_packet(0, expected)))
            }
        }
    }
}

/// Call the codec until it reports something other than "no packet yet",
/// stops making progress, or the round limit is reached.
fn run_codec(
    codec: &mut dyn FrameCodec,
    rounds: u8,
    expected: MsgId,
    input: &[u8],
) -> ParseOutcome {
    let mut done = 0usize;
    for _ in 0..rounds {
        let mut outcome = codec.parse(expected, &input[done..]);
        let n = outcome.consumed.min(input.len() - done);
        done += n;
        outcome.consumed = done;
        if outcome.status != ParseStatus::NoPacket || n == 0 || done >= input.len() {
            return outcome;
        }
    }
    ParseOutcome::no_packet(done, expected)
}
