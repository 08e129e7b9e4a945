//! Serial transport abstraction.
//!
//! Concrete implementations:
//! - ESP-IDF UART driver (`adapters::uart`)
//! - host simulation and test mocks
//!
//! The engine is generic over `SerialTransport`, so swapping the physical
//! line requires no change to scheduling or parsing.

use super::api::SerialClient;
use super::protocol::LineSettings;

/// Byte-oriented, half-duplex serial line.
pub trait SerialTransport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Apply the line settings of the selected protocol.
    fn configure(&mut self, line: &LineSettings) -> Result<(), Self::Error>;

    /// Write one complete frame. Blocks until queued for transmission.
    fn write(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Start delivering received bytes to `client.on_rx`.
    ///
    /// Transports without a receive path of their own keep the default.
    fn bind_rx(&mut self, client: SerialClient) -> Result<(), Self::Error> {
        let _ = client;
        Ok(())
    }
}
