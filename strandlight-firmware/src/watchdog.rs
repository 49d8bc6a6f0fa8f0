//! Task watchdog users for the long-running tasks.
//!
//! Wraps ESP-IDF's Task Watchdog Timer (TWDT) user API. A task that stops
//! feeding its handle (a render stuck in the RMT driver, a console read
//! that never returns) trips the watchdog.

use esp_idf_svc::sys::{
    esp_task_wdt_add_user, esp_task_wdt_delete_user, esp_task_wdt_reset_user,
    esp_task_wdt_user_handle_t, EspError,
};
use log::{debug, error};
use std::ffi::CStr;

/// A registered watchdog user. Unregisters on drop.
pub struct WatchdogHandle {
    handle: esp_task_wdt_user_handle_t,
    name: &'static CStr,
}

impl WatchdogHandle {
    /// Register a watchdog user, e.g. `c"frame"` or `c"console"`.
    pub fn register(name: &'static CStr) -> Result<Self, EspError> {
        let mut handle: esp_task_wdt_user_handle_t = std::ptr::null_mut();

        // SAFETY: name is a static NUL-terminated string and handle is a valid out pointer
        let result = unsafe { esp_task_wdt_add_user(name.as_ptr(), &mut handle) };
        EspError::convert(result)?;

        debug!("Watchdog: registered user '{name:?}'");
        Ok(Self { handle, name })
    }

    /// Must be called within the watchdog timeout period.
    pub fn feed(&self) {
        let result = unsafe { esp_task_wdt_reset_user(self.handle) };
        if result != 0 {
            error!("Watchdog: failed to feed '{:?}'", self.name);
        }
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        debug!("Watchdog: unregistering user '{:?}'", self.name);
        let result = unsafe { esp_task_wdt_delete_user(self.handle) };
        if result != 0 {
            error!(
                "Watchdog: failed to unregister '{:?}': error code {result}",
                self.name
            );
        }
    }
}
