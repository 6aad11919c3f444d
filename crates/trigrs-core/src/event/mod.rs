// Trigrs Input Events
// Raw events delivered by the host and their normalized matching form

pub mod dpad;

use std::fmt;

use bitflags::bitflags;
use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::Key;

pub use dpad::{DpadTracker, GamePadEvent};

/// Whether a key went down or came up.
///
/// Numeric values match the `value` field of evdev key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum KeyAction {
    Up = 0,
    Down = 1,
}

impl KeyAction {
    /// Create a KeyAction from its evdev value. Auto-repeat (2) maps to Down.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyAction::Up),
            1 | 2 => Some(KeyAction::Down),
            _ => None,
        }
    }

    pub fn to_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Up => write!(f, "up"),
            KeyAction::Down => write!(f, "down"),
        }
    }
}

bitflags! {
    /// Modifier state attached to key events and performed actions.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MetaState: u32 {
        const SHIFT_LEFT = 1 << 0;
        const SHIFT_RIGHT = 1 << 1;
        const CTRL_LEFT = 1 << 2;
        const CTRL_RIGHT = 1 << 3;
        const ALT_LEFT = 1 << 4;
        const ALT_RIGHT = 1 << 5;
        const META_LEFT = 1 << 6;
        const META_RIGHT = 1 << 7;
        const FUNCTION = 1 << 8;

        const SHIFT = Self::SHIFT_LEFT.bits() | Self::SHIFT_RIGHT.bits();
        const CTRL = Self::CTRL_LEFT.bits() | Self::CTRL_RIGHT.bits();
        const ALT = Self::ALT_LEFT.bits() | Self::ALT_RIGHT.bits();
        const META = Self::META_LEFT.bits() | Self::META_RIGHT.bits();
    }
}

impl MetaState {
    /// The meta flag a modifier key sets while held. Empty for other keys.
    pub fn from_modifier(key: Key) -> MetaState {
        match key {
            Key::LEFT_SHIFT => MetaState::SHIFT_LEFT,
            Key::RIGHT_SHIFT => MetaState::SHIFT_RIGHT,
            Key::LEFT_CTRL => MetaState::CTRL_LEFT,
            Key::RIGHT_CTRL => MetaState::CTRL_RIGHT,
            Key::LEFT_ALT => MetaState::ALT_LEFT,
            Key::RIGHT_ALT => MetaState::ALT_RIGHT,
            Key::LEFT_META => MetaState::META_LEFT,
            Key::RIGHT_META => MetaState::META_RIGHT,
            Key::FN => MetaState::FUNCTION,
            _ => MetaState::empty(),
        }
    }
}

/// The device an event originated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DeviceInfo {
    pub id: i32,
    /// Stable identifier that survives reconnects
    pub descriptor: String,
    pub name: String,
    pub is_external: bool,
}

impl DeviceInfo {
    /// A built-in device (keyboard, volume buttons)
    pub fn internal(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            descriptor: String::new(),
            name: name.into(),
            is_external: false,
        }
    }

    /// An external device identified by its descriptor
    pub fn external(id: i32, descriptor: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            descriptor: descriptor.into(),
            name: name.into(),
            is_external: true,
        }
    }
}

/// A physical key event as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub scan_code: u16,
    pub action: KeyAction,
    /// Non-zero for auto-repeated down events
    pub repeat_count: u32,
    pub meta_state: MetaState,
    pub device: DeviceInfo,
}

impl KeyEvent {
    pub fn new(key: Key, action: KeyAction, device: DeviceInfo) -> Self {
        Self {
            key,
            scan_code: 0,
            action,
            repeat_count: 0,
            meta_state: MetaState::empty(),
            device,
        }
    }

    pub fn down(key: Key, device: DeviceInfo) -> Self {
        Self::new(key, KeyAction::Down, device)
    }

    pub fn up(key: Key, device: DeviceInfo) -> Self {
        Self::new(key, KeyAction::Up, device)
    }

    pub fn with_scan_code(mut self, scan_code: u16) -> Self {
        self.scan_code = scan_code;
        self
    }

    pub fn with_meta_state(mut self, meta_state: MetaState) -> Self {
        self.meta_state = meta_state;
        self
    }

    pub fn with_repeat_count(mut self, repeat_count: u32) -> Self {
        self.repeat_count = repeat_count;
        self
    }
}

/// Which assistant invocation fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum AssistantType {
    /// Matches every assistant type
    Any,
    Voice,
    Device,
}

/// Swipe gestures on a fingerprint sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintGesture {
    SwipeDown,
    SwipeUp,
    SwipeLeft,
    SwipeRight,
}

/// Any event the engine accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Assistant(AssistantType),
    Fingerprint(FingerprintGesture),
    FloatingButton { uid: String, action: KeyAction },
}

/// An event reduced to what trigger keys are matched against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchEvent {
    Key(KeyEvent),
    Assistant(AssistantType),
    Fingerprint(FingerprintGesture),
    FloatingButton(String),
}

impl MatchEvent {
    pub fn key_event(&self) -> Option<&KeyEvent> {
        match self {
            MatchEvent::Key(event) => Some(event),
            _ => None,
        }
    }

    /// Identity used to pair a down with its up
    pub(crate) fn press_id(&self) -> PressId {
        match self {
            MatchEvent::Key(event) => PressId::Key {
                key: event.key,
                scan_code: event.scan_code,
                device_id: event.device.id,
            },
            MatchEvent::Assistant(kind) => PressId::Assistant(*kind),
            MatchEvent::Fingerprint(gesture) => PressId::Fingerprint(*gesture),
            MatchEvent::FloatingButton(uid) => PressId::FloatingButton(uid.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PressId {
    Key {
        key: Key,
        scan_code: u16,
        device_id: i32,
    },
    Assistant(AssistantType),
    Fingerprint(FingerprintGesture),
    FloatingButton(String),
}
