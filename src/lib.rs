//! Inverter gateway firmware library.
//!
//! Exposes the serial client and the inverter protocol for integration
//! testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod client;
pub mod config;
pub mod error;
pub mod inverter;
pub mod pins;

pub mod adapters;
pub mod drivers;
