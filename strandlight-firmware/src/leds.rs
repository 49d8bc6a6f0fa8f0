//! WS2812 strings on the RMT peripheral.

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::RmtChannel;
use log::debug;
use smart_leds::{brightness, SmartLedsWrite, RGB8};
use strandlight_patterns_lib::{ChannelOrder, LedOutput, LedString, OutputError};
use ws2812_esp32_rmt_driver::Ws2812Esp32Rmt;

use crate::config::StringConfig;

/// Pixel buffer for one string, pushed out over its own RMT channel.
pub struct RmtOutput {
    driver: Ws2812Esp32Rmt<'static>,
    pixels: Vec<RGB8>,
    brightness: u8,
    order: ChannelOrder,
}

impl RmtOutput {
    pub fn new<C: RmtChannel, P: OutputPin>(
        pin: impl Peripheral<P = P> + 'static,
        channel: impl Peripheral<P = C> + 'static,
        led_count: usize,
        brightness: u8,
        order: ChannelOrder,
    ) -> Result<Self> {
        debug!("Creating RMT output: {led_count} LEDs, brightness {brightness}, order {order:?}");
        let driver = Ws2812Esp32Rmt::new(channel, pin)?;

        Ok(Self {
            driver,
            pixels: vec![RGB8::default(); led_count],
            brightness,
            order,
        })
    }
}

impl LedOutput for RmtOutput {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), OutputError> {
        let len = self.pixels.len();
        let pixel = self
            .pixels
            .get_mut(index)
            .ok_or(OutputError::IndexOutOfRange { index, len })?;
        *pixel = color;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), OutputError> {
        self.pixels.fill(RGB8::default());
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), OutputError> {
        // Reorder at the boundary, then brightness as recommended by smart-leds
        let order = self.order;
        self.driver
            .write(brightness(
                self.pixels.iter().map(move |&p| order.apply(p)),
                self.brightness,
            ))
            .map_err(|e| OutputError::Transport(e.to_string()))
    }
}

/// Open string `index` on `channel` and blank it.
pub fn open_string<C: RmtChannel>(
    index: usize,
    string_config: &StringConfig,
    channel: impl Peripheral<P = C> + 'static,
    brightness: u8,
    order: ChannelOrder,
) -> Result<LedString<RmtOutput>> {
    // SAFETY: We trust the user-configured GPIO pin number is valid for this board
    let pin = unsafe { AnyIOPin::new(i32::from(string_config.gpio)) };
    let output = RmtOutput::new(pin, channel, string_config.led_count, brightness, order)?;
    let mut string = LedString::new(index, output);
    string.blank()?;
    debug!("String {index}: GPIO {}, {} LEDs", string_config.gpio, string_config.led_count);
    Ok(string)
}
