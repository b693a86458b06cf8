//! Runtime settings for the engine, resolved from the TOML configuration.

use crate::config::error::ConfigError;
use crate::config::schema::Config;
use crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::navigation::NavigationSettings;
use crate::tabs::DEFAULT_MAX_CLOSED_TABS;
use std::time::Duration;

/// Resolved engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Navigation guard timing.
    pub navigation: NavigationSettings,
    /// Refetch the directory after every committed mutation.
    pub refetch_after_mutation: bool,
    /// Refetch the directory when a stream ends.
    pub refetch_on_stream_end: bool,
    /// Closed tabs remembered for reopen.
    pub max_closed_tabs: usize,
    /// Event channel capacity.
    pub channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            navigation: NavigationSettings::default(),
            refetch_after_mutation: true,
            refetch_on_stream_end: true,
            max_closed_tabs: DEFAULT_MAX_CLOSED_TABS,
            channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl TryFrom<&Config> for EngineSettings {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        if config.events.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "events.channel_capacity".to_string(),
                value: "0".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            navigation: NavigationSettings {
                debounce_window: parse_duration(
                    "navigation.debounce_window",
                    &config.navigation.debounce_window,
                )?,
                pending_grace: parse_duration(
                    "navigation.pending_grace",
                    &config.navigation.pending_grace,
                )?,
            },
            refetch_after_mutation: config.directory.refetch_after_mutation,
            refetch_on_stream_end: config.directory.refetch_on_stream_end,
            max_closed_tabs: config.tabs.max_closed_tabs,
            channel_capacity: config.events.channel_capacity,
        })
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves_to_default_settings() {
        let settings = EngineSettings::try_from(&Config::default()).expect("defaults");
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(
            settings.navigation.debounce_window,
            Duration::from_millis(300)
        );
        assert_eq!(settings.navigation.pending_grace, Duration::from_millis(100));
    }

    #[test]
    fn custom_durations_are_parsed() {
        let mut config = Config::default();
        config.navigation.debounce_window = "1s 500ms".to_string();
        config.navigation.pending_grace = "0s".to_string();
        let settings = EngineSettings::try_from(&config).expect("valid");
        assert_eq!(
            settings.navigation.debounce_window,
            Duration::from_millis(1500)
        );
        assert_eq!(settings.navigation.pending_grace, Duration::ZERO);
    }

    #[test]
    fn invalid_duration_names_the_field() {
        let mut config = Config::default();
        config.navigation.pending_grace = "soon".to_string();
        let err = EngineSettings::try_from(&config).expect_err("invalid");
        match err {
            ConfigError::InvalidValue { field, value, .. } => {
                assert_eq!(field, "navigation.pending_grace");
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidValue, got: {other:?}"),
        }
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let mut config = Config::default();
        config.events.channel_capacity = 0;
        assert!(EngineSettings::try_from(&config).is_err());
    }
}
