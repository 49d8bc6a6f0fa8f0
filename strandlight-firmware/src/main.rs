use anyhow::{Context, Result};
use esp_idf_hal::cpu::Core;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::prelude::*;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};
use std::sync::Arc;
use strandlight_patterns_lib::{
    Clock, ControlState, FrameDriver, LedString, Listener, SharedControl,
};

mod clock;
mod config;
mod console;
mod frame;
mod leds;
mod thread_util;
mod watchdog;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::console::UartConsole;
use crate::frame::Heartbeat;
use crate::leds::{open_string, RmtOutput};

/// Initialize logging and load configuration from NVS
fn init_logging_and_config(nvs: EspDefaultNvsPartition) -> Result<Config> {
    config::init_nvs(nvs)?;
    let config = Config::load_or_default();

    let level = config.log_level.as_level_filter();
    if let Err(e) = esp_idf_svc::log::set_target_level("*", level) {
        warn!("Failed to set log level: {e}");
    } else {
        info!("Log level set to {:?}", config.log_level);
    }

    Ok(config)
}

/// Open every configured string on its own RMT channel
fn open_strings(
    config: &Config,
    rmt: esp_idf_hal::rmt::RMT,
) -> Result<Vec<LedString<RmtOutput>>> {
    let configs = &config.strings;
    let (brightness, order) = (config.brightness, config.channel_order);
    let mut strings = Vec::with_capacity(configs.len());

    if let Some(string_config) = configs.first() {
        strings.push(open_string(0, string_config, rmt.channel0, brightness, order)?);
    }
    if let Some(string_config) = configs.get(1) {
        strings.push(open_string(1, string_config, rmt.channel1, brightness, order)?);
    }
    if let Some(string_config) = configs.get(2) {
        strings.push(open_string(2, string_config, rmt.channel2, brightness, order)?);
    }
    if let Some(string_config) = configs.get(3) {
        strings.push(open_string(3, string_config, rmt.channel3, brightness, order)?);
    }

    info!("Opened {} LED string(s)", strings.len());
    Ok(strings)
}

fn main() -> Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Starting strandlight firmware {}...", env!("GIT_VERSION"));

    let peripherals = Peripherals::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let config = init_logging_and_config(nvs)?;

    let clock = SystemClock;
    let engine = &config.engine;
    engine.validate().context("Invalid engine configuration")?;

    let strings = open_strings(&config, peripherals.rmt)?;
    let pixel_counts: Vec<usize> = strings.iter().map(LedString::pixel_count).collect();

    let control = Arc::new(SharedControl::new(ControlState::new(
        engine.enabled_patterns.clone(),
        clock.now(),
    )?));

    // SAFETY: esp_random only reads the hardware RNG
    let seed = u64::from(unsafe { esp_idf_sys::esp_random() });
    let driver = FrameDriver::new(engine, Arc::clone(&control), &pixel_counts, seed)?;
    info!(
        "Patterns: {:?}, {}s each, manual hold {}s",
        engine.enabled_patterns,
        engine.pattern_duration_ms / 1000,
        engine.manual_timeout_ms / 1000
    );

    let heartbeat = Heartbeat::new(config.status_led_gpio, clock.now());
    let console = UartConsole::new(
        peripherals.uart0,
        config.console_tx_gpio,
        config.console_rx_gpio,
        config.console_baud,
    )?;
    let listener = Listener::new(console, clock, Arc::clone(&control));

    // Rendering gets its own core, away from the console and system tasks
    {
        let tick_period_ms = engine.tick_period_ms;
        thread_util::spawn_named(c"frame", Some(Core::Core1), move || {
            if let Err(e) = frame::frame_task(driver, strings, heartbeat, tick_period_ms) {
                error!("Frame task error: {e:?}");
            }
        })?;
    }

    thread_util::spawn_named(c"console", None, move || {
        if let Err(e) = console::console_task(listener) {
            error!("Console task error: {e:?}");
        }
    })?;

    info!("All systems running!");

    // Main loop - keep alive
    loop {
        FreeRtos::delay_ms(1000);
    }
}
