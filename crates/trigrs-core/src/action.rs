// Trigrs Actions
// What a triggered key map performs and how it repeats or holds

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::event::MetaState;
use crate::Key;

/// The payload of an action, performed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionData {
    /// Synthesize a key event with extra modifiers
    KeyEvent { key: Key, meta: MetaState },
    /// Type a string
    Text(String),
    /// Anything else the host understands, identified by name
    Custom(String),
}

impl ActionData {
    pub fn key(key: Key) -> Self {
        ActionData::KeyEvent {
            key,
            meta: MetaState::empty(),
        }
    }

    /// The meta flag this action sets while held, if it is a modifier key
    pub fn modifier_meta(&self) -> Option<MetaState> {
        match self {
            ActionData::KeyEvent { key, .. } if key.is_modifier() => {
                Some(MetaState::from_modifier(*key))
            }
            _ => None,
        }
    }

    pub fn is_modifier_key(&self) -> bool {
        self.modifier_meta().is_some()
    }
}

impl fmt::Display for ActionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionData::KeyEvent { key, meta } if meta.is_empty() => write!(f, "key:{}", key),
            ActionData::KeyEvent { key, meta } => write!(f, "key:{}+{:?}", key, meta),
            ActionData::Text(text) => write!(f, "text:{:?}", text),
            ActionData::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// The phase of an action being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEventAction {
    Down,
    Up,
    DownUp,
}

impl fmt::Display for InputEventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEventAction::Down => write!(f, "down"),
            InputEventAction::Up => write!(f, "up"),
            InputEventAction::DownUp => write!(f, "down_up"),
        }
    }
}

/// When a repeating action stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    TriggerReleased,
    LimitReached,
    TriggerPressedAgain,
}

/// One action of a key map with its performance options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub data: ActionData,
    /// Perform this many times per firing
    pub multiplier: Option<u32>,
    pub repeat: bool,
    pub repeat_mode: RepeatMode,
    pub repeat_rate: Option<Duration>,
    pub repeat_delay: Option<Duration>,
    pub repeat_limit: Option<u32>,
    pub hold_down: bool,
    pub stop_hold_down_when_pressed_again: bool,
    pub hold_down_duration: Option<Duration>,
    pub delay_before_next: Option<Duration>,
}

impl Action {
    pub fn new(data: ActionData) -> Self {
        Self {
            data,
            multiplier: None,
            repeat: false,
            repeat_mode: RepeatMode::default(),
            repeat_rate: None,
            repeat_delay: None,
            repeat_limit: None,
            hold_down: false,
            stop_hold_down_when_pressed_again: false,
            hold_down_duration: None,
            delay_before_next: None,
        }
    }

    pub fn key(key: Key) -> Self {
        Self::new(ActionData::key(key))
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    pub fn with_repeat(mut self, mode: RepeatMode) -> Self {
        self.repeat = true;
        self.repeat_mode = mode;
        self
    }

    pub fn with_repeat_timing(mut self, delay: Duration, rate: Duration) -> Self {
        self.repeat_delay = Some(delay);
        self.repeat_rate = Some(rate);
        self
    }

    pub fn with_repeat_limit(mut self, limit: u32) -> Self {
        self.repeat_limit = Some(limit);
        self
    }

    pub fn with_hold_down(mut self) -> Self {
        self.hold_down = true;
        self
    }

    pub fn with_hold_down_duration(mut self, duration: Duration) -> Self {
        self.hold_down = true;
        self.hold_down_duration = Some(duration);
        self
    }

    pub fn with_stop_hold_down_when_pressed_again(mut self) -> Self {
        self.hold_down = true;
        self.stop_hold_down_when_pressed_again = true;
        self
    }

    pub fn with_delay_before_next(mut self, delay: Duration) -> Self {
        self.delay_before_next = Some(delay);
        self
    }

    /// How many times each firing performs this action. Zero counts as one.
    pub fn times(&self) -> u32 {
        self.multiplier.unwrap_or(1).max(1)
    }

    /// Whether a repeat loop that has performed `performed` iterations must
    /// stop. A limit applies in every repeat mode.
    pub fn repeat_limit_reached(&self, performed: u32) -> bool {
        match self.repeat_limit {
            Some(limit) => performed >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_meta() {
        assert_eq!(
            ActionData::key(Key::LEFT_SHIFT).modifier_meta(),
            Some(MetaState::SHIFT_LEFT)
        );
        assert_eq!(ActionData::key(Key::A).modifier_meta(), None);
        assert_eq!(ActionData::Text("x".into()).modifier_meta(), None);
    }

    #[test]
    fn test_times_defaults_to_one() {
        assert_eq!(Action::key(Key::A).times(), 1);
        assert_eq!(Action::key(Key::A).with_multiplier(0).times(), 1);
        assert_eq!(Action::key(Key::A).with_multiplier(3).times(), 3);
    }

    #[test]
    fn test_repeat_limit_reached() {
        let action = Action::key(Key::A)
            .with_repeat(RepeatMode::LimitReached)
            .with_repeat_limit(2);
        assert!(!action.repeat_limit_reached(1));
        assert!(action.repeat_limit_reached(2));
        assert!(!Action::key(Key::A).repeat_limit_reached(100));
    }

    #[test]
    fn test_repeat_mode_parse() {
        assert_eq!(
            "trigger_pressed_again".parse::<RepeatMode>(),
            Ok(RepeatMode::TriggerPressedAgain)
        );
        assert_eq!(RepeatMode::LimitReached.to_string(), "limit_reached");
    }

    #[test]
    fn test_action_data_display() {
        assert_eq!(ActionData::key(Key::B).to_string(), "key:B");
        assert_eq!(ActionData::Custom("toast".into()).to_string(), "custom:toast");
    }
}
