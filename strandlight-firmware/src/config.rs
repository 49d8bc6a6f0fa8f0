use anyhow::{anyhow, Result};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use strandlight_patterns_lib::{ChannelOrder, EngineConfig};

/// One RMT TX channel per string
pub const MAX_STRINGS: usize = 4;

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

const NVS_NAMESPACE: &str = "strandlight";
const NVS_CONFIG_KEY: &str = "config";

// Global NVS handle - initialized once in main
static NVS: Mutex<Option<EspNvs<NvsDefault>>> = Mutex::new(None);

pub fn init_nvs(nvs_partition: EspNvsPartition<NvsDefault>) -> Result<()> {
    debug!("Initializing NVS namespace: {NVS_NAMESPACE}");
    let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)?;
    *NVS.lock().map_err(|_| anyhow!("NVS lock poisoned"))? = Some(nvs);
    info!("NVS initialized");
    Ok(())
}

/// A physical LED string: data pin and pixel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringConfig {
    pub gpio: u8,
    pub led_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log_level: LogLevel,
    /// Strings in render order
    #[serde(default = "default_strings")]
    pub strings: Vec<StringConfig>,
    /// LED brightness (0-255), applied at the output
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    /// Channel order of the strips relative to what the WS2812 driver sends
    #[serde(default)]
    pub channel_order: ChannelOrder,
    /// Heartbeat LED - set to 0 to disable
    #[serde(default = "default_status_led_gpio")]
    pub status_led_gpio: u8,
    #[serde(default = "default_console_tx_gpio")]
    pub console_tx_gpio: u8,
    #[serde(default = "default_console_rx_gpio")]
    pub console_rx_gpio: u8,
    #[serde(default = "default_console_baud")]
    pub console_baud: u32,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_strings() -> Vec<StringConfig> {
    vec![StringConfig {
        gpio: 18,
        led_count: 50,
    }]
}

const fn default_brightness() -> u8 {
    255
}

const fn default_status_led_gpio() -> u8 {
    27
}

const fn default_console_tx_gpio() -> u8 {
    1
}

const fn default_console_rx_gpio() -> u8 {
    3
}

const fn default_console_baud() -> u32 {
    115_200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            strings: default_strings(),
            brightness: default_brightness(),
            channel_order: ChannelOrder::default(),
            status_led_gpio: default_status_led_gpio(),
            console_tx_gpio: default_console_tx_gpio(),
            console_rx_gpio: default_console_rx_gpio(),
            console_baud: default_console_baud(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Clamp values to valid ranges and fix invalid values.
    ///
    /// The engine section is not touched here; it is checked when the
    /// Frame Driver is built and a bad one stops startup.
    pub fn validate(&mut self) {
        let before = self.strings.len();
        self.strings.retain(|s| s.led_count > 0);
        if self.strings.len() != before {
            warn!("Dropped {} string(s) with no LEDs", before - self.strings.len());
        }
        if self.strings.len() > MAX_STRINGS {
            warn!(
                "{} strings configured, only the first {MAX_STRINGS} will be driven",
                self.strings.len()
            );
            self.strings.truncate(MAX_STRINGS);
        }
        if self.strings.is_empty() {
            warn!("No LED strings configured, resetting to default");
            self.strings = default_strings();
        }
        if self.brightness == 0 {
            warn!("Brightness is 0, strings will stay dark");
        }
        if self.console_baud == 0 {
            warn!("Console baud rate is 0, resetting to default");
            self.console_baud = default_console_baud();
        }
    }

    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(Some(mut config)) => {
                info!("Loaded config from NVS");
                config.validate();
                config
            }
            Ok(None) => {
                info!("No config in NVS, storing defaults");
                let config = Self::default();
                if let Err(e) = config.save() {
                    warn!("Failed to store default config: {e}");
                }
                config
            }
            Err(e) => {
                warn!("Failed to load config from NVS: {e}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load() -> Result<Option<Self>> {
        debug!("Loading config from NVS");
        let nvs_guard = NVS.lock().map_err(|_| anyhow!("NVS lock poisoned"))?;
        let nvs = nvs_guard.as_ref().ok_or_else(|| anyhow!("NVS not initialized"))?;

        let Some(len) = nvs.blob_len(NVS_CONFIG_KEY)? else {
            return Ok(None);
        };
        debug!("Config blob size: {len} bytes");
        let mut buf = vec![0u8; len];
        nvs.get_blob(NVS_CONFIG_KEY, &mut buf)?;
        let config: Self = serde_json::from_slice(&buf)?;
        debug!(
            "Config parsed: strings={:?}, log_level={:?}, patterns={:?}",
            config.strings, config.log_level, config.engine.enabled_patterns
        );
        Ok(Some(config))
    }

    pub fn save(&self) -> Result<()> {
        debug!("Saving config to NVS");
        let mut nvs_guard = NVS.lock().map_err(|_| anyhow!("NVS lock poisoned"))?;
        let nvs = nvs_guard.as_mut().ok_or_else(|| anyhow!("NVS not initialized"))?;

        let json = serde_json::to_vec(self)?;
        debug!("Config JSON size: {} bytes", json.len());
        nvs.set_blob(NVS_CONFIG_KEY, &json)?;
        info!("Config saved to NVS");
        Ok(())
    }
}
