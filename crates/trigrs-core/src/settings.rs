// Trigrs Settings Module
// Global timing defaults used when a trigger or action has no override

use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(feature = "toml-config")]
use serde::Deserialize;

/// Timing defaults and the force-vibrate flag.
///
/// Loaded from a TOML file (default: ~/.config/trigrs/settings.toml):
///
/// ```toml
/// [timing]
/// long_press_delay_ms = 500
/// double_press_delay_ms = 300
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub long_press_delay: Duration,
    pub double_press_delay: Duration,
    pub sequence_trigger_timeout: Duration,
    pub vibrate_duration: Duration,
    pub hold_down_duration: Duration,
    pub repeat_delay: Duration,
    pub repeat_rate: Duration,
    /// Vibrate for every trigger, not just those asking for it
    pub force_vibrate: bool,

    /// Path to the settings file (for reload)
    source_path: Option<PathBuf>,
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            long_press_delay: Duration::from_millis(500),
            double_press_delay: Duration::from_millis(300),
            sequence_trigger_timeout: Duration::from_millis(1000),
            vibrate_duration: Duration::from_millis(200),
            hold_down_duration: Duration::from_millis(1000),
            repeat_delay: Duration::from_millis(400),
            repeat_rate: Duration::from_millis(50),
            force_vibrate: false,
            source_path: None,
        }
    }
}

/// TOML representation for deserializing settings
#[cfg(feature = "toml-config")]
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    #[serde(default)]
    timing: Option<TimingToml>,
}

#[cfg(feature = "toml-config")]
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TimingToml {
    long_press_delay_ms: Option<u64>,
    double_press_delay_ms: Option<u64>,
    sequence_trigger_timeout_ms: Option<u64>,
    vibrate_duration_ms: Option<u64>,
    hold_down_duration_ms: Option<u64>,
    repeat_delay_ms: Option<u64>,
    repeat_rate_ms: Option<u64>,
    force_vibrate: Option<bool>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.source_path = Some(path.as_ref().to_path_buf());
        Ok(settings)
    }

    /// Load settings from TOML string
    #[cfg(feature = "toml-config")]
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let parsed: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();
        let Some(timing) = parsed.timing else {
            return Ok(settings);
        };

        let fields = [
            ("long_press_delay_ms", timing.long_press_delay_ms, &mut settings.long_press_delay),
            ("double_press_delay_ms", timing.double_press_delay_ms, &mut settings.double_press_delay),
            (
                "sequence_trigger_timeout_ms",
                timing.sequence_trigger_timeout_ms,
                &mut settings.sequence_trigger_timeout,
            ),
            ("vibrate_duration_ms", timing.vibrate_duration_ms, &mut settings.vibrate_duration),
            ("hold_down_duration_ms", timing.hold_down_duration_ms, &mut settings.hold_down_duration),
            ("repeat_delay_ms", timing.repeat_delay_ms, &mut settings.repeat_delay),
            ("repeat_rate_ms", timing.repeat_rate_ms, &mut settings.repeat_rate),
        ];

        for (name, value, slot) in fields {
            if let Some(ms) = value {
                *slot = parse_delay(name, ms)?;
            }
        }

        if let Some(force) = timing.force_vibrate {
            settings.force_vibrate = force;
        }

        log::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Get the default settings path
    #[cfg(feature = "toml-config")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("trigrs").join("settings.toml"))
    }

    /// Load from default location (~/.config/trigrs/settings.toml)
    #[cfg(feature = "toml-config")]
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::new())
    }

    /// Reload settings from the original file
    #[cfg(feature = "toml-config")]
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        if let Some(ref path) = self.source_path {
            let new_settings = Self::from_file(path)?;
            *self = new_settings;
            Ok(())
        } else {
            Err(SettingsError::InvalidValue("No source path set".to_string()))
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

#[cfg(feature = "toml-config")]
fn parse_delay(name: &str, ms: u64) -> Result<Duration, SettingsError> {
    if ms == 0 {
        return Err(SettingsError::InvalidValue(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(Duration::from_millis(ms))
}

/// Create default settings content for a new installation
pub fn default_settings_content() -> &'static str {
    r#"# Trigrs Settings
# Place this file at: ~/.config/trigrs/settings.toml

[timing]
# How long a key must be held to count as a long press
long_press_delay_ms = 500

# Time allowed between the two presses of a double press
double_press_delay_ms = 300

# Time allowed to complete a sequence trigger after its first key
sequence_trigger_timeout_ms = 1000

vibrate_duration_ms = 200
hold_down_duration_ms = 1000
repeat_delay_ms = 400
repeat_rate_ms = 50

# Vibrate whenever any trigger fires
force_vibrate = false
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::new();
        assert_eq!(settings.long_press_delay, Duration::from_millis(500));
        assert_eq!(settings.double_press_delay, Duration::from_millis(300));
        assert_eq!(settings.sequence_trigger_timeout, Duration::from_millis(1000));
        assert!(!settings.force_vibrate);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
[timing]
long_press_delay_ms = 800
repeat_rate_ms = 20
force_vibrate = true
"#;

        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.long_press_delay, Duration::from_millis(800));
        assert_eq!(settings.repeat_rate, Duration::from_millis(20));
        assert_eq!(settings.double_press_delay, Duration::from_millis(300));
        assert!(settings.force_vibrate);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_default_content_parses_to_defaults() {
        let settings = Settings::from_toml(default_settings_content()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_zero_delay_rejected() {
        let toml = "[timing]\ndouble_press_delay_ms = 0\n";
        assert!(matches!(
            Settings::from_toml(toml),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_unknown_field_rejected() {
        let toml = "[timing]\nlong_press = 3\n";
        assert!(matches!(
            Settings::from_toml(toml),
            Err(SettingsError::TomlParse(_))
        ));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_reload_without_source() {
        let mut settings = Settings::new();
        assert!(settings.reload().is_err());
    }
}
