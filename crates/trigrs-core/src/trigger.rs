// Trigrs Trigger Model
// Trigger keys, click types and trigger modes

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::event::{AssistantType, FingerprintGesture, MatchEvent};
use crate::Key;

/// How a trigger key must be pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ClickType {
    #[default]
    ShortPress,
    LongPress,
    DoublePress,
}

impl ClickType {
    pub const ALL: [ClickType; 3] = [
        ClickType::ShortPress,
        ClickType::LongPress,
        ClickType::DoublePress,
    ];
}

/// How the keys of a multi-key trigger combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// All keys held at once
    Parallel,
    /// Keys pressed one after another
    Sequence,
    /// Single-key triggers
    #[default]
    Undefined,
}

/// Which devices a key-code trigger key accepts events from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum KeyDevice {
    #[default]
    Any,
    Internal,
    External { descriptor: String },
}

impl fmt::Display for KeyDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDevice::Any => write!(f, "any"),
            KeyDevice::Internal => write!(f, "internal"),
            KeyDevice::External { descriptor } => write!(f, "external:{}", descriptor),
        }
    }
}

/// The input source a trigger key listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerKeyKind {
    KeyCode {
        key: Key,
        scan_code: Option<u16>,
        /// Match on scan code instead of key code when one is known
        detect_with_scan_code: bool,
        device: KeyDevice,
        /// Delivered through an input method, which repeats down events
        from_input_method: bool,
    },
    Assistant(AssistantType),
    Fingerprint(FingerprintGesture),
    FloatingButton(String),
}

/// One input expected within a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub kind: TriggerKeyKind,
    pub click_type: ClickType,
    consume: bool,
}

impl TriggerKey {
    pub fn new(kind: TriggerKeyKind, click_type: ClickType) -> Self {
        Self {
            kind,
            click_type,
            consume: true,
        }
    }

    /// A key-code trigger key on any device
    pub fn key(key: Key, click_type: ClickType) -> Self {
        Self::new(
            TriggerKeyKind::KeyCode {
                key,
                scan_code: None,
                detect_with_scan_code: false,
                device: KeyDevice::Any,
                from_input_method: false,
            },
            click_type,
        )
    }

    pub fn assistant(kind: AssistantType) -> Self {
        Self::new(TriggerKeyKind::Assistant(kind), ClickType::ShortPress)
    }

    pub fn fingerprint(gesture: FingerprintGesture) -> Self {
        Self::new(TriggerKeyKind::Fingerprint(gesture), ClickType::ShortPress)
    }

    pub fn floating_button(uid: impl Into<String>) -> Self {
        Self::new(TriggerKeyKind::FloatingButton(uid.into()), ClickType::ShortPress)
    }

    pub fn with_consume(mut self, consume: bool) -> Self {
        self.consume = consume;
        self
    }

    pub fn with_device(mut self, device: KeyDevice) -> Self {
        if let TriggerKeyKind::KeyCode { device: d, .. } = &mut self.kind {
            *d = device;
        }
        self
    }

    pub fn with_scan_code(mut self, code: u16, detect_with_scan_code: bool) -> Self {
        if let TriggerKeyKind::KeyCode {
            scan_code,
            detect_with_scan_code: detect,
            ..
        } = &mut self.kind
        {
            *scan_code = Some(code);
            *detect = detect_with_scan_code;
        }
        self
    }

    pub fn with_input_method(mut self, from_input_method: bool) -> Self {
        if let TriggerKeyKind::KeyCode {
            from_input_method: f,
            ..
        } = &mut self.kind
        {
            *f = from_input_method;
        }
        self
    }

    /// Whether a matching event is suppressed. Gesture, assistant and
    /// floating button events are always consumed.
    pub fn consume(&self) -> bool {
        match self.kind {
            TriggerKeyKind::KeyCode { .. } => self.consume,
            _ => true,
        }
    }

    /// The key code when this is a key-code trigger key
    pub fn key_code(&self) -> Option<Key> {
        match self.kind {
            TriggerKeyKind::KeyCode { key, .. } => Some(key),
            _ => None,
        }
    }

    fn scan_code_detection(&self) -> Option<u16> {
        match self.kind {
            TriggerKeyKind::KeyCode {
                key,
                scan_code: Some(code),
                detect_with_scan_code,
                ..
            } if detect_with_scan_code || key == Key::RESERVED => Some(code),
            _ => None,
        }
    }

    /// Whether `event` pressed with `click_type` satisfies this key.
    pub fn matches(&self, event: &MatchEvent, click_type: ClickType) -> bool {
        if self.click_type != click_type {
            return false;
        }

        match (&self.kind, event) {
            (TriggerKeyKind::KeyCode { key, device, .. }, MatchEvent::Key(ev)) => {
                let code_matches = match self.scan_code_detection() {
                    Some(scan_code) => scan_code == ev.scan_code,
                    None => *key == ev.key,
                };
                code_matches
                    && match device {
                        KeyDevice::Any => true,
                        KeyDevice::Internal => !ev.device.is_external,
                        KeyDevice::External { descriptor } => {
                            ev.device.is_external && ev.device.descriptor == *descriptor
                        }
                    }
            }
            (TriggerKeyKind::Assistant(kind), MatchEvent::Assistant(other)) => {
                *kind == AssistantType::Any || *other == AssistantType::Any || kind == other
            }
            (TriggerKeyKind::Fingerprint(gesture), MatchEvent::Fingerprint(other)) => {
                gesture == other
            }
            (TriggerKeyKind::FloatingButton(uid), MatchEvent::FloatingButton(other)) => {
                uid == other
            }
            _ => false,
        }
    }

    /// Whether `event` satisfies this key under any click type
    pub fn matches_any_click(&self, event: &MatchEvent) -> bool {
        self.matches(event, self.click_type)
    }

    /// Raw identity comparison ignoring click type and device
    pub(crate) fn same_source(&self, event: &MatchEvent) -> bool {
        match (&self.kind, event) {
            (TriggerKeyKind::KeyCode { key, .. }, MatchEvent::Key(ev)) => *key == ev.key,
            (TriggerKeyKind::Assistant(_), MatchEvent::Assistant(_))
            | (TriggerKeyKind::Fingerprint(_), MatchEvent::Fingerprint(_))
            | (TriggerKeyKind::FloatingButton(_), MatchEvent::FloatingButton(_)) => true,
            _ => false,
        }
    }

    /// Whether this key and `other` would be satisfied by the same press.
    /// Used when comparing triggers with each other.
    pub fn matches_other_key(&self, other: &TriggerKey) -> bool {
        if self.click_type != other.click_type {
            return false;
        }

        match (&self.kind, &other.kind) {
            (
                TriggerKeyKind::KeyCode { key, device, .. },
                TriggerKeyKind::KeyCode {
                    key: other_key,
                    device: other_device,
                    ..
                },
            ) => {
                let code_matches = match self.scan_code_detection() {
                    Some(scan_code) => other.scan_code_detection() == Some(scan_code),
                    None => key == other_key,
                };
                code_matches
                    && match device {
                        KeyDevice::Any => true,
                        KeyDevice::Internal => *other_device == KeyDevice::Internal,
                        KeyDevice::External { .. } => device == other_device,
                    }
            }
            (TriggerKeyKind::Assistant(a), TriggerKeyKind::Assistant(b)) => a == b,
            (TriggerKeyKind::Fingerprint(a), TriggerKeyKind::Fingerprint(b)) => a == b,
            (TriggerKeyKind::FloatingButton(a), TriggerKeyKind::FloatingButton(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TriggerKeyKind::KeyCode { key, device, .. } => {
                write!(f, "{}@{} ({})", key, device, self.click_type)
            }
            TriggerKeyKind::Assistant(kind) => write!(f, "assistant:{}", kind),
            TriggerKeyKind::Fingerprint(gesture) => write!(f, "fingerprint:{}", gesture),
            TriggerKeyKind::FloatingButton(uid) => write!(f, "button:{} ({})", uid, self.click_type),
        }
    }
}

/// An ordered set of trigger keys plus per-trigger options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trigger {
    pub keys: Vec<TriggerKey>,
    pub mode: TriggerMode,
    pub vibrate: bool,
    pub vibrate_duration: Option<Duration>,
    /// Vibrate once when a long press is armed and again when it fires
    pub long_press_double_vibration: bool,
    pub show_toast: bool,
    pub long_press_delay: Option<Duration>,
    pub double_press_delay: Option<Duration>,
    pub sequence_timeout: Option<Duration>,
}

impl Trigger {
    pub fn new(keys: Vec<TriggerKey>, mode: TriggerMode) -> Self {
        Self {
            keys,
            mode,
            ..Default::default()
        }
    }

    /// A single-key trigger
    pub fn single(key: TriggerKey) -> Self {
        Self::new(vec![key], TriggerMode::Undefined)
    }

    pub fn parallel(keys: Vec<TriggerKey>) -> Self {
        Self::new(keys, TriggerMode::Parallel)
    }

    pub fn sequence(keys: Vec<TriggerKey>) -> Self {
        Self::new(keys, TriggerMode::Sequence)
    }

    /// Whether actions run on the down event of the final key rather than
    /// after the whole trigger has been released.
    pub fn fires_on_key_down(&self) -> bool {
        let single_non_double = self.keys.len() <= 1
            && self
                .keys
                .first()
                .map_or(true, |k| k.click_type != ClickType::DoublePress);

        (single_non_double && self.mode == TriggerMode::Undefined) || self.mode == TriggerMode::Parallel
    }

    pub fn last_index(&self) -> usize {
        self.keys.len().saturating_sub(1)
    }

    /// Whether the key at `index` exists and matches `event`
    pub fn matches_at(&self, index: usize, event: &MatchEvent, click_type: ClickType) -> bool {
        self.keys
            .get(index)
            .is_some_and(|key| key.matches(event, click_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceInfo, KeyEvent};

    fn key_down(key: Key) -> MatchEvent {
        MatchEvent::Key(KeyEvent::down(key, DeviceInfo::internal(0, "kbd")))
    }

    #[test]
    fn test_fires_on_key_down() {
        let short = TriggerKey::key(Key::A, ClickType::ShortPress);
        let double = TriggerKey::key(Key::A, ClickType::DoublePress);

        assert!(Trigger::single(short.clone()).fires_on_key_down());
        assert!(!Trigger::single(double.clone()).fires_on_key_down());
        assert!(Trigger::parallel(vec![short.clone(), double]).fires_on_key_down());
        assert!(!Trigger::sequence(vec![short.clone()]).fires_on_key_down());
        assert!(!Trigger::new(vec![short.clone(), short], TriggerMode::Undefined).fires_on_key_down());
    }

    #[test]
    fn test_matches_click_type() {
        let key = TriggerKey::key(Key::A, ClickType::LongPress);
        assert!(key.matches(&key_down(Key::A), ClickType::LongPress));
        assert!(!key.matches(&key_down(Key::A), ClickType::ShortPress));
        assert!(!key.matches(&key_down(Key::B), ClickType::LongPress));
        assert!(key.matches_any_click(&key_down(Key::A)));
    }

    #[test]
    fn test_matches_device_filter() {
        let external = DeviceInfo::external(3, "pad-1", "Gamepad");
        let event = MatchEvent::Key(KeyEvent::down(Key::A, external));

        let internal_key = TriggerKey::key(Key::A, ClickType::ShortPress).with_device(KeyDevice::Internal);
        let same_external = TriggerKey::key(Key::A, ClickType::ShortPress).with_device(KeyDevice::External {
            descriptor: "pad-1".into(),
        });
        let other_external = TriggerKey::key(Key::A, ClickType::ShortPress).with_device(KeyDevice::External {
            descriptor: "pad-2".into(),
        });

        assert!(!internal_key.matches(&event, ClickType::ShortPress));
        assert!(same_external.matches(&event, ClickType::ShortPress));
        assert!(!other_external.matches(&event, ClickType::ShortPress));
        assert!(TriggerKey::key(Key::A, ClickType::ShortPress).matches(&event, ClickType::ShortPress));
    }

    #[test]
    fn test_matches_scan_code() {
        let key = TriggerKey::key(Key::A, ClickType::ShortPress).with_scan_code(0x1e, true);
        let device = DeviceInfo::internal(0, "kbd");

        let same_scan = MatchEvent::Key(KeyEvent::down(Key::B, device.clone()).with_scan_code(0x1e));
        let other_scan = MatchEvent::Key(KeyEvent::down(Key::A, device).with_scan_code(0x30));

        assert!(key.matches(&same_scan, ClickType::ShortPress));
        assert!(!key.matches(&other_scan, ClickType::ShortPress));
    }

    #[test]
    fn test_unknown_key_code_falls_back_to_scan_code() {
        let key = TriggerKey::key(Key::RESERVED, ClickType::ShortPress).with_scan_code(0x110, false);
        let event = MatchEvent::Key(
            KeyEvent::down(Key::RESERVED, DeviceInfo::internal(0, "mouse")).with_scan_code(0x110),
        );
        assert!(key.matches(&event, ClickType::ShortPress));
    }

    #[test]
    fn test_assistant_any_matches_every_type() {
        let any = TriggerKey::assistant(AssistantType::Any);
        let voice = TriggerKey::assistant(AssistantType::Voice);

        assert!(any.matches(&MatchEvent::Assistant(AssistantType::Device), ClickType::ShortPress));
        assert!(voice.matches(&MatchEvent::Assistant(AssistantType::Any), ClickType::ShortPress));
        assert!(!voice.matches(&MatchEvent::Assistant(AssistantType::Device), ClickType::ShortPress));
    }

    #[test]
    fn test_non_key_triggers_always_consume() {
        let key = TriggerKey::fingerprint(FingerprintGesture::SwipeDown).with_consume(false);
        assert!(key.consume());
        let key = TriggerKey::key(Key::A, ClickType::ShortPress).with_consume(false);
        assert!(!key.consume());
    }

    #[test]
    fn test_matches_other_key() {
        let any = TriggerKey::key(Key::A, ClickType::ShortPress);
        let internal = TriggerKey::key(Key::A, ClickType::ShortPress).with_device(KeyDevice::Internal);
        let long = TriggerKey::key(Key::A, ClickType::LongPress);

        assert!(any.matches_other_key(&internal));
        assert!(!internal.matches_other_key(&any));
        assert!(!any.matches_other_key(&long));
        assert!(TriggerKey::floating_button("b1").matches_other_key(&TriggerKey::floating_button("b1")));
    }

    #[test]
    fn test_matches_at_out_of_range() {
        let trigger = Trigger::single(TriggerKey::key(Key::A, ClickType::ShortPress));
        assert!(trigger.matches_at(0, &key_down(Key::A), ClickType::ShortPress));
        assert!(!trigger.matches_at(1, &key_down(Key::A), ClickType::ShortPress));
    }
}
