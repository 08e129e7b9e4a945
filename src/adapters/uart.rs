//! UART adapter for the serial client.
//!
//! On ESP-IDF this drives a UART peripheral through the IDF driver and runs
//! a receive thread that forwards every read to [`SerialClient::on_rx`].
//! On other targets it is a simulation stub that records written frames.

use crate::client::protocol::LineSettings;
use crate::client::{SerialClient, SerialTransport};

/// Errors from the UART driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    /// An IDF call failed with the given code.
    Driver(i32),
    /// Fewer bytes were queued than requested.
    ShortWrite { written: usize, expected: usize },
    UnsupportedLine,
    RxThread,
}

impl core::fmt::Display for UartError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Driver(rc) => write!(f, "UART driver call failed (rc={})", rc),
            Self::ShortWrite { written, expected } => write!(f, "short write {}/{}", written, expected),
            Self::UnsupportedLine => write!(f, "unsupported line settings"),
            Self::RxThread => write!(f, "rx thread spawn failed"),
        }
    }
}

/// Validate the frame format against what a UART can do.
fn check_line(line: &LineSettings) -> Result<(), UartError> {
    let ok = (5..=8).contains(&line.data_bits) && (1..=2).contains(&line.stop_bits) && line.baud > 0;
    if ok { Ok(()) } else { Err(UartError::UnsupportedLine) }
}

// ── ESP-IDF implementation ────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp_impl {
    use esp_idf_svc::sys::*;
    use log::{debug, info, warn};

    use super::{LineSettings, SerialClient, UartError, check_line};
    use crate::client::protocol::Parity;
    use crate::drivers::task_pin::{self, Core};

    const RX_CHUNK: usize = 128;
    const RX_POLL_MS: u32 = 20;

    pub struct UartTransport {
        port: uart_port_t,
        tx_gpio: i32,
        rx_gpio: i32,
        rx_buf: usize,
        installed: bool,
    }

    impl UartTransport {
        pub fn new(port: i32, tx_gpio: i32, rx_gpio: i32, rx_buf: usize) -> Self {
            Self {
                port: port as uart_port_t,
                tx_gpio,
                rx_gpio,
                rx_buf,
                installed: false,
            }
        }

        pub(super) fn configure(&mut self, line: &LineSettings) -> Result<(), UartError> {
            check_line(line)?;
            let cfg = uart_config_t {
                baud_rate: line.baud as i32,
                data_bits: match line.data_bits {
                    5 => uart_word_length_t_UART_DATA_5_BITS,
                    6 => uart_word_length_t_UART_DATA_6_BITS,
                    7 => uart_word_length_t_UART_DATA_7_BITS,
                    _ => uart_word_length_t_UART_DATA_8_BITS,
                },
                parity: match line.parity {
                    Parity::None => uart_parity_t_UART_PARITY_DISABLE,
                    Parity::Even => uart_parity_t_UART_PARITY_EVEN,
                    Parity::Odd => uart_parity_t_UART_PARITY_ODD,
                },
                stop_bits: if line.stop_bits == 2 {
                    uart_stop_bits_t_UART_STOP_BITS_2
                } else {
                    uart_stop_bits_t_UART_STOP_BITS_1
                },
                flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
                ..Default::default()
            };

            // SAFETY: `cfg` outlives the calls; the driver is installed at
            // most once per transport.
            unsafe {
                if !self.installed {
                    let ret = uart_driver_install(self.port, (2 * self.rx_buf) as i32, 0, 0, core::ptr::null_mut(), 0);
                    check(ret)?;
                    self.installed = true;
                }
                check(uart_param_config(self.port, &cfg))?;
                check(uart_set_pin(self.port, self.tx_gpio, self.rx_gpio, -1, -1))?;
            }
            info!(
                "uart{}: {} baud {}-{:?}-{} (tx={}, rx={})",
                self.port, line.baud, line.data_bits, line.parity, line.stop_bits, self.tx_gpio, self.rx_gpio
            );
            Ok(())
        }

        pub(super) fn write(&mut self, frame: &[u8]) -> Result<(), UartError> {
            // SAFETY: the driver copies `frame` into its TX ring before returning.
            let n = unsafe { uart_write_bytes(self.port, frame.as_ptr().cast(), frame.len()) };
            if n < 0 {
                return Err(UartError::Driver(n));
            }
            if n as usize != frame.len() {
                return Err(UartError::ShortWrite {
                    written: n as usize,
                    expected: frame.len(),
                });
            }
            Ok(())
        }

        pub(super) fn bind_rx(&mut self, client: SerialClient) -> Result<(), UartError> {
            let port = self.port;
            task_pin::spawn_on_core(Core::Pro, 6, 4, "uart_rx\0", move || rx_loop(port, client))
                .map(|_| ())
                .map_err(|e| {
                    warn!("uart{}: {}", port, e);
                    UartError::RxThread
                })
        }
    }

    fn rx_loop(port: uart_port_t, client: SerialClient) {
        let ticks = (RX_POLL_MS * configTICK_RATE_HZ / 1000).max(1) as TickType_t;
        let mut buf = [0u8; RX_CHUNK];
        loop {
            // SAFETY: `buf` is valid for RX_CHUNK bytes for the whole call.
            let n = unsafe { uart_read_bytes(port, buf.as_mut_ptr().cast(), RX_CHUNK as u32, ticks) };
            if n > 0 {
                debug!("uart{}: rx {} B", port, n);
                client.on_rx(&buf[..n as usize]);
            } else if n < 0 {
                warn!("uart{}: read failed (rc={})", port, n);
            }
        }
    }

    fn check(ret: esp_err_t) -> Result<(), UartError> {
        if ret == ESP_OK as i32 { Ok(()) } else { Err(UartError::Driver(ret)) }
    }
}

#[cfg(target_os = "espidf")]
pub use esp_impl::UartTransport;

// ── Simulation stub ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct UartTransport {
    port: i32,
    line: Option<LineSettings>,
    sent: Vec<Vec<u8>>,
}

#[cfg(not(target_os = "espidf"))]
impl UartTransport {
    pub fn new(port: i32, _tx_gpio: i32, _rx_gpio: i32, _rx_buf: usize) -> Self {
        Self {
            port,
            line: None,
            sent: Vec::new(),
        }
    }

    /// Line settings last applied.
    pub fn line(&self) -> Option<LineSettings> {
        self.line
    }

    /// Frames written so far.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    fn configure(&mut self, line: &LineSettings) -> Result<(), UartError> {
        check_line(line)?;
        log::info!("uart{}(sim): {} baud", self.port, line.baud);
        self.line = Some(*line);
        Ok(())
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), UartError> {
        log::debug!("uart{}(sim): tx {} B", self.port, frame.len());
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn bind_rx(&mut self, _client: SerialClient) -> Result<(), UartError> {
        Ok(())
    }
}

impl SerialTransport for UartTransport {
    type Error = UartError;

    fn configure(&mut self, line: &LineSettings) -> Result<(), UartError> {
        UartTransport::configure(self, line)
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), UartError> {
        UartTransport::write(self, frame)
    }

    fn bind_rx(&mut self, client: SerialClient) -> Result<(), UartError> {
        UartTransport::bind_rx(self, client)
    }
}
