//! Frame task
//!
//! Runs the Frame Driver on fixed deadlines of `tick_period_ms` and blinks
//! the status LED.

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, Output, PinDriver};
use log::{debug, info, warn};
use strandlight_patterns_lib::{Clock, FrameDriver, LedString, Millis, TickReport};

use crate::clock::SystemClock;
use crate::leds::RmtOutput;
use crate::watchdog::WatchdogHandle;

/// Status LED half-period
const HEARTBEAT_MS: u32 = 1000;

/// Status LED toggled once a second while the frame task is alive.
pub struct Heartbeat {
    pin: PinDriver<'static, AnyIOPin, Output>,
    last_toggle: Millis,
}

impl Heartbeat {
    /// Returns `None` when `gpio` is 0 (disabled) or the pin can't be driven.
    pub fn new(gpio: u8, now: Millis) -> Option<Self> {
        if gpio == 0 {
            return None;
        }
        // SAFETY: We trust the user-configured GPIO pin number is valid
        let pin = unsafe { AnyIOPin::new(i32::from(gpio)) };
        let mut pin = match PinDriver::output(pin) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to initialize status LED on GPIO {gpio}: {e:?}");
                return None;
            }
        };
        if let Err(e) = pin.set_low() {
            warn!("Failed to set status LED low: {e:?}");
        }
        info!("Status LED on GPIO {gpio}");
        Some(Self {
            pin,
            last_toggle: now,
        })
    }

    pub fn update(&mut self, now: Millis) {
        if now.elapsed_since(self.last_toggle) < HEARTBEAT_MS {
            return;
        }
        self.last_toggle = now;
        if let Err(e) = self.pin.toggle() {
            warn!("Failed to toggle status LED: {e:?}");
        }
    }
}

/// Run the frame task. Only returns if the watchdog can't be set up.
pub fn frame_task(
    mut driver: FrameDriver,
    mut strings: Vec<LedString<RmtOutput>>,
    mut heartbeat: Option<Heartbeat>,
    tick_period_ms: u32,
) -> Result<()> {
    let watchdog = WatchdogHandle::register(c"frame")?;
    let clock = SystemClock;
    info!(
        "Frame task started: {} string(s), {tick_period_ms}ms tick, state {}",
        strings.len(),
        driver.system_state()
    );

    let mut last_report: Option<TickReport> = None;
    let mut deadline = clock.now();

    loop {
        watchdog.feed();

        let now = clock.now();
        match driver.tick(now, &mut strings) {
            Ok(report) => {
                if last_report != Some(report) {
                    debug!("Tick {now}: {report:?}");
                    last_report = Some(report);
                }
            }
            Err(e) => warn!("Render failed: {e}"),
        }

        if let Some(heartbeat) = heartbeat.as_mut() {
            heartbeat.update(now);
        }

        deadline = deadline.wrapping_add(tick_period_ms);
        let now = clock.now();
        // Past the deadline the wrapping difference is huge
        let remaining = deadline.elapsed_since(now);
        if remaining > tick_period_ms {
            debug!("Frame overran by {}ms", now.elapsed_since(deadline));
            deadline = now;
        } else {
            FreeRtos::delay_ms(remaining);
        }
    }
}
