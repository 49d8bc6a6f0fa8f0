//! Spawning threads with FreeRTOS task names
//!
//! Rust's `std::thread::Builder::name()` sets the pthread name after creation,
//! but ESP-IDF creates the FreeRTOS task at pthread creation time with the
//! default name. `ThreadSpawnConfiguration` has to be set before spawning.

use esp_idf_hal::cpu::Core;
use esp_idf_hal::sys::EspError;
use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
use std::ffi::CStr;
use std::thread::JoinHandle;

/// Spawn a thread with a FreeRTOS task name, optionally pinned to a core.
///
/// FreeRTOS task names are limited to 16 characters including the null terminator.
/// The previous spawn configuration is restored afterwards.
///
/// # Example
/// ```ignore
/// spawn_named(c"frame", Some(Core::Core1), || { /* ... */ })?;
/// ```
pub fn spawn_named<F, T>(
    name: &'static CStr,
    core: Option<Core>,
    f: F,
) -> Result<JoinHandle<T>, EspError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let prev_conf = ThreadSpawnConfiguration::get();

    ThreadSpawnConfiguration {
        name: Some(name.to_bytes_with_nul()),
        pin_to_core: core,
        ..Default::default()
    }
    .set()?;

    let handle = std::thread::spawn(f);

    // Restore previous config, or the default if none was set
    prev_conf.unwrap_or_default().set()?;

    Ok(handle)
}
