//! Inverter Gateway Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  main thread: bootstrap, then periodic state report        │
//! │                                                            │
//! │  ┌──────────────┐  frames   ┌───────────────────────────┐  │
//! │  │ UartTransport│◀──────────│ serial client worker      │  │
//! │  │  (uart1)     │──────────▶│  scheduler · parser       │  │
//! │  └──────────────┘  on_rx    └─────────────┬─────────────┘  │
//! │                                           │ handlers       │
//! │                                           ▼                │
//! │                                   InverterState            │
//! └────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use invgate::adapters::uart::UartTransport;
use invgate::client::{self, ClientShared, ProtocolSelection, SerialClient};
use invgate::config::EngineConfig;
use invgate::inverter::{self, InverterState};
use invgate::pins;

/// Command queue, timer signal and protocol selection shared with the worker.
static SHARED: ClientShared = ClientShared::new(ProtocolSelection::Index(0));

const REPORT_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Inverter gateway v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Protocol table ─────────────────────────────────────
    let state = InverterState::new();
    let handle = SerialClient::new(&SHARED, 1);
    let protocols = vec![inverter::protocol(handle, &state)];

    // ── 3. Serial client ──────────────────────────────────────
    let uart = UartTransport::new(
        pins::INVERTER_UART_PORT,
        pins::INVERTER_UART_TX_GPIO,
        pins::INVERTER_UART_RX_GPIO,
        pins::INVERTER_UART_RX_BUF,
    );
    let client = client::init(&SHARED, ProtocolSelection::Index(0), protocols, uart, EngineConfig::default())?;

    // ── 4. Polling ────────────────────────────────────────────
    inverter::start_polling(&client)?;

    // ── 5. Report loop ────────────────────────────────────────
    loop {
        std::thread::sleep(REPORT_INTERVAL);
        let snap = state.snapshot();
        match serde_json::to_string(&snap) {
            Ok(json) => info!("INV: {}", json),
            Err(e) => warn!("INV: snapshot encode failed: {}", e),
        }
    }
}
