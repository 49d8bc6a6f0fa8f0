//! Operator console on a UART
//!
//! Bytes typed on the serial line go to the command interpreter one at a
//! time; replies are written back on the same line.

use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::delay::{FreeRtos, TickType};
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{config::Config as UartConfig, Uart, UartDriver};
use esp_idf_hal::units::Hertz;
use log::{info, warn};
use strandlight_patterns_lib::{ChannelError, CommandChannel, Listener};

use crate::clock::SystemClock;
use crate::watchdog::WatchdogHandle;

/// Back-off after a UART error before reading again
const ERROR_BACKOFF_MS: u32 = 100;

pub struct UartConsole {
    uart: UartDriver<'static>,
}

impl UartConsole {
    pub fn new<U: Uart>(
        uart: impl Peripheral<P = U> + 'static,
        tx_gpio: u8,
        rx_gpio: u8,
        baud: u32,
    ) -> Result<Self> {
        // SAFETY: We trust the user-configured GPIO pin numbers are valid for this board
        let tx = unsafe { AnyIOPin::new(i32::from(tx_gpio)) };
        let rx = unsafe { AnyIOPin::new(i32::from(rx_gpio)) };
        let config = UartConfig::default().baudrate(Hertz(baud));
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        info!("Console on UART (TX GPIO {tx_gpio}, RX GPIO {rx_gpio}, {baud} baud)");
        Ok(Self { uart })
    }
}

impl CommandChannel for UartConsole {
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, ChannelError> {
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte, TickType::from(timeout).ticks()) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) => Err(ChannelError::Io(e.to_string())),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), ChannelError> {
        for chunk in [line.as_bytes(), b"\r\n"] {
            let mut written = 0;
            while written < chunk.len() {
                written += self
                    .uart
                    .write(&chunk[written..])
                    .map_err(|e| ChannelError::Io(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Run the console task. Returns only if the UART goes away.
pub fn console_task(mut listener: Listener<UartConsole, SystemClock>) -> Result<()> {
    let watchdog = WatchdogHandle::register(c"console")?;
    info!("Console ready - press h for help");

    loop {
        watchdog.feed();

        match listener.service() {
            Ok(_) => {}
            Err(ChannelError::Closed) => {
                warn!("Console closed, exiting task");
                return Ok(());
            }
            Err(e) => {
                warn!("Console error: {e}");
                FreeRtos::delay_ms(ERROR_BACKOFF_MS);
            }
        }
    }
}
