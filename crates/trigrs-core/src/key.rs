// Trigrs Key Type
// Key and button codes from Linux input-event-codes.h

use std::fmt;
use std::str::FromStr;

include!(concat!(env!("OUT_DIR"), "/key_codes.rs"));

/// Alternate spellings accepted when parsing key names
const KEY_ALIASES: &[(&str, u16)] = &[
    ("ESCAPE", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("PRINT", 99),
    ("VOLUME_DOWN", 114),
    ("VOLUME_UP", 115),
    ("DPAD_CENTER", 353),
    ("BTN_A", 304),
    ("BTN_B", 305),
    ("BTN_X", 307),
    ("BTN_Y", 308),
];

/// Display name for a key code
pub fn key_name(code: u16) -> &'static str {
    KEY_TABLE
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
        .unwrap_or("UNKNOWN")
}

/// Try to parse a key name to a key code
pub fn key_from_name(name: &str) -> Option<Key> {
    let name_upper = name.trim().to_uppercase();
    let name_upper = name_upper.strip_prefix("KEYCODE_").unwrap_or(&name_upper);

    KEY_TABLE
        .iter()
        .chain(KEY_ALIASES.iter())
        .find(|(n, _)| *n == name_upper)
        .map(|(_, code)| Key(*code))
        .or_else(|| {
            // Raw numeric codes are accepted as-is
            name_upper.parse::<u16>().ok().map(Key)
        })
}

impl Key {
    /// Whether this key behaves as a keyboard modifier
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::LEFT_SHIFT
                | Key::RIGHT_SHIFT
                | Key::LEFT_CTRL
                | Key::RIGHT_CTRL
                | Key::LEFT_ALT
                | Key::RIGHT_ALT
                | Key::LEFT_META
                | Key::RIGHT_META
                | Key::FN
        )
    }

    /// Whether this is one of the directional pad buttons
    pub fn is_dpad(self) -> bool {
        matches!(
            self,
            Key::DPAD_UP | Key::DPAD_DOWN | Key::DPAD_LEFT | Key::DPAD_RIGHT
        )
    }
}
