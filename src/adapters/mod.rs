//! Adapters: concrete implementations of the client's port traits.
//!
//! | Adapter | Implements        | Connects to            |
//! |---------|-------------------|------------------------|
//! | `uart`  | SerialTransport   | ESP-IDF UART driver    |

pub mod uart;
