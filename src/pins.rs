//! GPIO / peripheral assignments for the gateway board.
//!
//! Every driver references this module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Inverter RS-232 link (MAX3232 level shifter)
// ---------------------------------------------------------------------------

/// UART peripheral wired to the inverter port.
pub const INVERTER_UART_PORT: i32 = 1;
pub const INVERTER_UART_TX_GPIO: i32 = 17;
pub const INVERTER_UART_RX_GPIO: i32 = 18;

/// UART driver receive buffer, bytes.
pub const INVERTER_UART_RX_BUF: usize = 1024;
