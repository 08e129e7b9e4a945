//! Fuzz target: `InverterCodec::parse`
//!
//! Drives arbitrary byte sequences through the inverter frame parser and
//! asserts that it never panics, never consumes past its input and never
//! yields a payload larger than the input.
//!
//! cargo fuzz run fuzz_inverter_codec

#![no_main]

use invgate::client::{FrameCodec, ParseStatus};
use invgate::inverter::{InverterCmd, InverterCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&sel, input)) = data.split_first() else {
        return;
    };
    let expected = InverterCmd::ALL[sel as usize % InverterCmd::ALL.len()].id();
    let mut codec = InverterCodec::new();

    let mut offset = 0;
    while offset < input.len() {
        let out = codec.parse(expected, &input[offset..]);
        assert!(out.consumed <= input.len() - offset, "consumed past input");
        assert!(out.payload.len() <= input.len(), "payload larger than input");
        if out.status == ParseStatus::Ok {
            assert_eq!(out.rsp_id, expected);
        }
        if out.consumed == 0 {
            break;
        }
        offset += out.consumed;
    }

    let stats = codec.stats();
    assert!(stats.valid + stats.crc_errors <= stats.packets);
});
