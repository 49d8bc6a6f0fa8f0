//! Engine configuration, loaded once at startup.

use serde::{Deserialize, Serialize};

use crate::control::SystemState;
use crate::patterns::{BulbParams, PatternKind, SparkleParams, WaveParams};

/// Reasons a configuration can't run. All of them are fatal at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NoPatterns,
    ZeroTickPeriod,
    ZeroPatternDuration,
    ZeroBulbSpacing,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPatterns => write!(f, "no patterns enabled"),
            Self::ZeroTickPeriod => write!(f, "tick_period_ms must be greater than zero"),
            Self::ZeroPatternDuration => write!(f, "pattern_duration_ms must be greater than zero"),
            Self::ZeroBulbSpacing => write!(f, "bulbs.spacing must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frame Driver period.
    pub tick_period_ms: u32,
    /// How long each pattern runs in auto rotation.
    pub pattern_duration_ms: u32,
    /// How long a manual selection is held without further commands.
    pub manual_timeout_ms: u32,
    /// Patterns in cycling order.
    pub enabled_patterns: Vec<PatternKind>,
    /// State the system starts in.
    pub system_state: SystemState,
    pub wave: WaveParams,
    pub sparkle: SparkleParams,
    pub bulbs: BulbParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 20,
            pattern_duration_ms: 60_000,
            manual_timeout_ms: 600_000,
            enabled_patterns: vec![
                PatternKind::Wave,
                PatternKind::Sparkle,
                PatternKind::DiscreteBulbs,
            ],
            system_state: SystemState::NightOn,
            wave: WaveParams::default(),
            sparkle: SparkleParams::default(),
            bulbs: BulbParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_patterns.is_empty() {
            return Err(ConfigError::NoPatterns);
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if self.pattern_duration_ms == 0 {
            return Err(ConfigError::ZeroPatternDuration);
        }
        if self.bulbs.spacing == 0 {
            return Err(ConfigError::ZeroBulbSpacing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_no_patterns_is_fatal() {
        let config = EngineConfig {
            enabled_patterns: Vec::new(),
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoPatterns));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = EngineConfig::default();
        config.tick_period_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickPeriod));

        let mut config = EngineConfig::default();
        config.bulbs.spacing = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBulbSpacing));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"enabled_patterns": ["sparkle", "wave"], "sparkle": {"white_pct": 0}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.enabled_patterns, vec![PatternKind::Sparkle, PatternKind::Wave]);
        assert_eq!(config.sparkle.white_pct, 0);
        assert_eq!(config.sparkle.fade_ms, 1500);
        assert_eq!(config.tick_period_ms, 20);
        assert_eq!(config.system_state, SystemState::NightOn);
    }
}
