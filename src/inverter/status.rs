//! Decoders for inverter response bodies.
//!
//! Bodies arrive already checksum- and shape-checked by
//! [`super::codec::InverterCodec`]; these turn them into typed values.

use core::fmt;

use serde::Serialize;

/// Why a response body could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer fields than the response carries.
    MissingField(usize),
    /// Field `n` is not a number.
    BadField(usize),
    UnknownMode(u8),
    BadLength(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(n) => write!(f, "missing field {}", n),
            Self::BadField(n) => write!(f, "field {} is not numeric", n),
            Self::UnknownMode(c) => write!(f, "unknown mode {:?}", *c as char),
            Self::BadLength(len) => write!(f, "unexpected body length {}", len),
        }
    }
}

impl std::error::Error for DecodeError {}

/// QPIGS: general status snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GeneralStatus {
    pub grid_voltage: f32,
    pub grid_frequency: f32,
    pub ac_out_voltage: f32,
    pub ac_out_frequency: f32,
    pub ac_out_apparent_power: u16,
    pub ac_out_active_power: u16,
    pub load_percent: u16,
    pub bus_voltage: u16,
    pub battery_voltage: f32,
    pub battery_charging_current: u16,
    pub battery_capacity: u16,
    pub temperature: i16,
    pub pv_current: f32,
    pub pv_voltage: f32,
    pub battery_voltage_scc: f32,
    pub battery_discharge_current: u16,
    /// Status bits 1, first character is the most significant bit.
    pub status1: u8,
    pub battery_voltage_offset: u16,
    pub eeprom_version: u16,
    pub pv_power: u16,
    pub status2: u8,
}

impl GeneralStatus {
    pub const FIELDS: usize = 21;

    pub fn parse(body: &[u8]) -> Result<Self, DecodeError> {
        let text = core::str::from_utf8(body).map_err(|_| DecodeError::BadField(0))?;
        let mut fields = Fields {
            iter: text.split_ascii_whitespace(),
            pos: 0,
        };

        macro_rules! field {
            ($ty:ty) => {{
                let (i, raw) = fields.next()?;
                raw.parse::<$ty>().map_err(|_| DecodeError::BadField(i))?
            }};
        }
        macro_rules! bits {
            () => {{
                let (i, raw) = fields.next()?;
                parse_bits(raw).ok_or(DecodeError::BadField(i))? as u8
            }};
        }

        let status = Self {
            grid_voltage: field!(f32),
            grid_frequency: field!(f32),
            ac_out_voltage: field!(f32),
            ac_out_frequency: field!(f32),
            ac_out_apparent_power: field!(u16),
            ac_out_active_power: field!(u16),
            load_percent: field!(u16),
            bus_voltage: field!(u16),
            battery_voltage: field!(f32),
            battery_charging_current: field!(u16),
            battery_capacity: field!(u16),
            temperature: field!(i16),
            pv_current: field!(f32),
            pv_voltage: field!(f32),
            battery_voltage_scc: field!(f32),
            battery_discharge_current: field!(u16),
            status1: bits!(),
            battery_voltage_offset: field!(u16),
            eeprom_version: field!(u16),
            pv_power: field!(u16),
            status2: bits!(),
        };
        Ok(status)
    }

    /// Battery power in watts, negative while discharging.
    pub fn battery_power(&self) -> i32 {
        if self.battery_discharge_current > 0 {
            -((self.battery_discharge_current as f32 * self.battery_voltage) as i32)
        } else {
            (self.battery_charging_current as f32 * self.battery_voltage) as i32
        }
    }

    /// Output power factor in percent, 0 with no apparent load.
    pub fn power_factor(&self) -> u8 {
        if self.ac_out_apparent_power == 0 {
            return 0;
        }
        (100 * u32::from(self.ac_out_active_power) / u32::from(self.ac_out_apparent_power)).min(100) as u8
    }
}

struct Fields<'a> {
    iter: core::str::SplitAsciiWhitespace<'a>,
    pos: usize,
}

impl<'a> Fields<'a> {
    fn next(&mut self) -> Result<(usize, &'a str), DecodeError> {
        let i = self.pos;
        self.pos += 1;
        self.iter.next().map(|raw| (i, raw)).ok_or(DecodeError::MissingField(i))
    }
}

/// Parse a string of '0'/'1' characters, most significant first.
fn parse_bits(raw: &str) -> Option<u64> {
    if raw.is_empty() || raw.len() > 64 {
        return None;
    }
    raw.bytes().try_fold(0u64, |acc, b| match b {
        b'0' => Some(acc << 1),
        b'1' => Some((acc << 1) | 1),
        _ => None,
    })
}

/// QMOD: device operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceMode {
    PowerOn,
    Standby,
    Bypass,
    Line,
    Battery,
    BatteryTest,
    Fault,
    Shutdown,
    Grid,
    Charge,
}

impl DeviceMode {
    pub fn parse(body: &[u8]) -> Result<Self, DecodeError> {
        let [c] = body else {
            return Err(DecodeError::BadLength(body.len()));
        };
        Ok(match c {
            b'P' => Self::PowerOn,
            b'S' => Self::Standby,
            b'Y' => Self::Bypass,
            b'L' => Self::Line,
            b'B' => Self::Battery,
            b'T' => Self::BatteryTest,
            b'F' => Self::Fault,
            b'D' => Self::Shutdown,
            b'G' => Self::Grid,
            b'C' => Self::Charge,
            other => return Err(DecodeError::UnknownMode(*other)),
        })
    }
}

/// QPIWS: warning bits. Bit `n` is the `n`-th character of the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarningFlags(pub u64);

impl WarningFlags {
    /// Characters other than '1' count as clear. Bits past 64 are ignored.
    pub fn parse(body: &[u8]) -> Self {
        let bits = body
            .iter()
            .take(64)
            .enumerate()
            .filter(|(_, b)| **b == b'1')
            .fold(0u64, |acc, (i, _)| acc | (1 << i));
        Self(bits)
    }

    pub fn is_set(self, bit: u32) -> bool {
        bit < 64 && self.0 & (1 << bit) != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

/// QVFW: firmware version "VERFW:NNNNN.NN".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u8,
}

impl FirmwareVersion {
    pub fn parse(body: &[u8]) -> Result<Self, DecodeError> {
        let text = core::str::from_utf8(body).map_err(|_| DecodeError::BadField(0))?;
        let rest = text.strip_prefix("VERFW:").ok_or(DecodeError::BadField(0))?;
        let (major, minor) = rest.split_once('.').ok_or(DecodeError::MissingField(1))?;
        Ok(Self {
            major: major.parse().map_err(|_| DecodeError::BadField(0))?,
            minor: minor.parse().map_err(|_| DecodeError::BadField(1))?,
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}.{:02}", self.major, self.minor)
    }
}
