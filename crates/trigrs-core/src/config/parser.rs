// Trigrs Config Parser - TOML with Serde
// Parses key maps and constraint groups from TOML

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::action::{Action, ActionData, RepeatMode};
use crate::constraint::{Constraint, ConstraintMode, ConstraintState};
use crate::event::{AssistantType, FingerprintGesture, MetaState};
use crate::key::key_from_name;
use crate::keymap::KeyMap;
use crate::trigger::{ClickType, KeyDevice, Trigger, TriggerKey, TriggerKeyKind, TriggerMode};
use crate::Key;

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// A key map document (root TOML table)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Constraint groups key maps can belong to
    #[serde(default)]
    pub group: Vec<GroupToml>,

    #[serde(default)]
    pub keymap: Vec<KeyMapToml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupToml {
    pub name: String,
    /// Enclosing group whose constraints also apply
    pub parent: Option<String>,
    #[serde(default)]
    pub constraints: ConstraintsToml,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintsToml {
    #[serde(default)]
    pub mode: ConstraintMode,
    #[serde(default)]
    pub list: Vec<Constraint>,
}

impl ConstraintsToml {
    fn to_model(&self) -> ConstraintState {
        ConstraintState::new(self.list.clone(), self.mode)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyMapToml {
    pub uid: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub group: Option<String>,
    pub trigger: TriggerToml,
    #[serde(default)]
    pub constraints: ConstraintsToml,
    #[serde(default, rename = "action")]
    pub actions: Vec<ActionToml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerToml {
    #[serde(default)]
    pub mode: TriggerMode,
    #[serde(default)]
    pub keys: Vec<TriggerKeyToml>,
    #[serde(default)]
    pub vibrate: bool,
    pub vibrate_duration_ms: Option<u64>,
    #[serde(default)]
    pub long_press_double_vibration: bool,
    #[serde(default)]
    pub show_toast: bool,
    pub long_press_delay_ms: Option<u64>,
    pub double_press_delay_ms: Option<u64>,
    pub sequence_timeout_ms: Option<u64>,
}

/// One trigger key. Exactly one of `key`/`scan_code`, `assistant`,
/// `fingerprint` or `floating_button` identifies the source.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerKeyToml {
    pub key: Option<String>,
    pub assistant: Option<AssistantType>,
    pub fingerprint: Option<FingerprintGesture>,
    pub floating_button: Option<String>,
    #[serde(default)]
    pub click: ClickType,
    #[serde(default = "default_true")]
    pub consume: bool,
    /// "any", "internal" or "external:<descriptor>"
    pub device: Option<String>,
    pub scan_code: Option<u16>,
    #[serde(default)]
    pub detect_with_scan_code: bool,
    #[serde(default)]
    pub input_method: bool,
}

/// One action. Exactly one of `key`, `text` or `custom` is the payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionToml {
    pub key: Option<String>,
    pub text: Option<String>,
    pub custom: Option<String>,
    /// Extra modifiers for key actions, e.g. ["ctrl", "shift_left"]
    #[serde(default)]
    pub meta: Vec<String>,
    pub multiplier: Option<u32>,
    pub repeat: Option<RepeatMode>,
    pub repeat_delay_ms: Option<u64>,
    pub repeat_rate_ms: Option<u64>,
    pub repeat_limit: Option<u32>,
    #[serde(default)]
    pub hold_down: bool,
    pub hold_down_ms: Option<u64>,
    #[serde(default)]
    pub stop_hold_down_when_pressed_again: bool,
    pub delay_before_next_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn millis(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_millis)
}

/// Parse a key name like "A", "KEY_VOLUME_UP" or "LEFT_CTRL"
pub fn parse_key(name: &str) -> Result<Key, ConfigError> {
    key_from_name(name).ok_or_else(|| ConfigError::InvalidKey(name.to_string()))
}

fn parse_device(value: &str) -> Result<KeyDevice, ConfigError> {
    match value {
        "any" => Ok(KeyDevice::Any),
        "internal" => Ok(KeyDevice::Internal),
        _ => match value.strip_prefix("external:") {
            Some(descriptor) if !descriptor.is_empty() => Ok(KeyDevice::External {
                descriptor: descriptor.to_string(),
            }),
            _ => Err(ConfigError::InvalidValue(format!("device '{}'", value))),
        },
    }
}

fn parse_meta(names: &[String]) -> Result<MetaState, ConfigError> {
    names.iter().try_fold(MetaState::empty(), |meta, name| {
        MetaState::from_name(&name.to_uppercase())
            .map(|flag| meta | flag)
            .ok_or_else(|| ConfigError::InvalidValue(format!("meta flag '{}'", name)))
    })
}

impl Config {
    /// Parse a TOML key map file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a key map document from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))
    }

    /// Convert every entry into a [`KeyMap`]. Entries that cannot be
    /// converted are dropped with a warning.
    pub fn to_models(&self) -> Vec<KeyMap> {
        let groups: HashMap<&str, &GroupToml> =
            self.group.iter().map(|g| (g.name.as_str(), g)).collect();
        let mut seen = HashSet::new();

        self.keymap
            .iter()
            .filter_map(|entry| {
                if !seen.insert(entry.uid.as_str()) {
                    log::warn!("Dropping key map {}: duplicate uid", entry.uid);
                    return None;
                }
                match entry.to_model(&groups) {
                    Ok(key_map) => Some(key_map),
                    Err(e) => {
                        log::warn!("Dropping key map {}: {}", entry.uid, e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl KeyMapToml {
    fn to_model(&self, groups: &HashMap<&str, &GroupToml>) -> Result<KeyMap, ConfigError> {
        let keys = self
            .trigger
            .keys
            .iter()
            .map(TriggerKeyToml::to_model)
            .collect::<Result<Vec<_>, _>>()?;

        let mut trigger = Trigger::new(keys, self.trigger.mode);
        trigger.vibrate = self.trigger.vibrate;
        trigger.vibrate_duration = millis(self.trigger.vibrate_duration_ms);
        trigger.long_press_double_vibration = self.trigger.long_press_double_vibration;
        trigger.show_toast = self.trigger.show_toast;
        trigger.long_press_delay = millis(self.trigger.long_press_delay_ms);
        trigger.double_press_delay = millis(self.trigger.double_press_delay_ms);
        trigger.sequence_timeout = millis(self.trigger.sequence_timeout_ms);

        let actions = self
            .actions
            .iter()
            .map(ActionToml::to_model)
            .collect::<Result<Vec<_>, _>>()?;

        let mut key_map = KeyMap::new(&self.uid, trigger, actions)
            .with_constraints(self.constraints.to_model())
            .with_group_constraints(group_chain(self.group.as_deref(), groups)?);
        key_map.enabled = self.enabled;

        Ok(key_map)
    }
}

/// Constraints of a group and all its ancestors, outermost first
fn group_chain(
    name: Option<&str>,
    groups: &HashMap<&str, &GroupToml>,
) -> Result<Vec<ConstraintState>, ConfigError> {
    let mut chain = Vec::new();
    let mut next = name;

    while let Some(name) = next {
        if chain.len() > groups.len() {
            return Err(ConfigError::InvalidValue(format!("group '{}' is its own ancestor", name)));
        }
        let group = groups
            .get(name)
            .ok_or_else(|| ConfigError::InvalidValue(format!("unknown group '{}'", name)))?;
        chain.push(group.constraints.to_model());
        next = group.parent.as_deref();
    }

    chain.reverse();
    Ok(chain)
}

impl TriggerKeyToml {
    fn to_model(&self) -> Result<TriggerKey, ConfigError> {
        let sources = [
            self.key.is_some() || self.scan_code.is_some(),
            self.assistant.is_some(),
            self.fingerprint.is_some(),
            self.floating_button.is_some(),
        ];
        if sources.iter().filter(|s| **s).count() != 1 {
            return Err(ConfigError::InvalidValue(
                "a trigger key needs exactly one of key, assistant, fingerprint or floating_button".into(),
            ));
        }

        if let Some(kind) = self.assistant {
            return Ok(TriggerKey::new(TriggerKeyKind::Assistant(kind), self.click));
        }
        if let Some(gesture) = self.fingerprint {
            return Ok(TriggerKey::new(TriggerKeyKind::Fingerprint(gesture), self.click));
        }
        if let Some(uid) = &self.floating_button {
            return Ok(TriggerKey::new(TriggerKeyKind::FloatingButton(uid.clone()), self.click));
        }

        // a scan code alone identifies the key when the name is unknown
        let key = match &self.key {
            Some(name) => parse_key(name)?,
            None => Key::RESERVED,
        };
        let device = match &self.device {
            Some(device) => parse_device(device)?,
            None => KeyDevice::Any,
        };

        let mut trigger_key = TriggerKey::key(key, self.click)
            .with_consume(self.consume)
            .with_device(device)
            .with_input_method(self.input_method);
        if let Some(scan_code) = self.scan_code {
            trigger_key = trigger_key.with_scan_code(scan_code, self.detect_with_scan_code);
        }
        Ok(trigger_key)
    }
}

impl ActionToml {
    fn to_model(&self) -> Result<Action, ConfigError> {
        let data = match (&self.key, &self.text, &self.custom) {
            (Some(key), None, None) => ActionData::KeyEvent {
                key: parse_key(key)?,
                meta: parse_meta(&self.meta)?,
            },
            (None, Some(text), None) => ActionData::Text(text.clone()),
            (None, None, Some(name)) => ActionData::Custom(name.clone()),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "an action needs exactly one of key, text or custom".into(),
                ))
            }
        };

        let mut action = Action::new(data);
        if let Some(multiplier) = self.multiplier {
            action = action.with_multiplier(multiplier);
        }
        if let Some(mode) = self.repeat {
            action = action.with_repeat(mode);
        }
        action.repeat_delay = millis(self.repeat_delay_ms);
        action.repeat_rate = millis(self.repeat_rate_ms);
        action.repeat_limit = self.repeat_limit;
        action.hold_down =
            self.hold_down || self.hold_down_ms.is_some() || self.stop_hold_down_when_pressed_again;
        action.hold_down_duration = millis(self.hold_down_ms);
        action.stop_hold_down_when_pressed_again = self.stop_hold_down_when_pressed_again;
        action.delay_before_next = millis(self.delay_before_next_ms);

        Ok(action)
    }
}
