//! CRC16/XMODEM (poly 0x1021, init 0, no reflection) as used by the
//! inverter RS-232 protocol.

const POLY: u16 = 0x1021;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

pub fn crc16_xmodem(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &b| {
        (crc << 8) ^ TABLE[(((crc >> 8) as u8) ^ b) as usize]
    })
}

/// Checksum bytes as sent on the wire, MSB first.
pub fn frame_crc(data: &[u8]) -> [u8; 2] {
    crc16_xmodem(data).to_be_bytes()
}

/// Bytes some firmware builds keep out of a checksum.
const RESERVED: [u8; 3] = [b'(', b'\r', b'\n'];

/// [`frame_crc`] with every byte that collides with a framing marker bumped
/// by one. Only for firmware builds that do this on their side too.
pub fn escaped_crc(data: &[u8]) -> [u8; 2] {
    let [hi, lo] = frame_crc(data);
    [escape(hi), escape(lo)]
}

fn escape(b: u8) -> u8 {
    if RESERVED.contains(&b) { b + 1 } else { b }
}
