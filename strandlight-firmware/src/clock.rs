use esp_idf_svc::sys::esp_timer_get_time;
use strandlight_patterns_lib::{Clock, Millis};

/// Milliseconds since boot from the ESP high-resolution timer, wrapping at
/// `u32::MAX` (about 49.7 days).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        // SAFETY: esp_timer_get_time only reads the system timer
        // Timer returns microseconds since boot - always non-negative
        let us = unsafe { esp_timer_get_time() };
        // Truncation to u32 is the intended wrap
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ms = (us / 1000) as u32;
        Millis(ms)
    }
}
