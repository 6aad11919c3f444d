use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Canonical key names and their Linux input-event-codes values.
///
/// The first name listed for a code is the display name.
const KEYS: &[(&str, u16)] = &[
    ("RESERVED", 0),
    ("ESC", 1),
    ("KEY_1", 2),
    ("KEY_2", 3),
    ("KEY_3", 4),
    ("KEY_4", 5),
    ("KEY_5", 6),
    ("KEY_6", 7),
    ("KEY_7", 8),
    ("KEY_8", 9),
    ("KEY_9", 10),
    ("KEY_0", 11),
    ("MINUS", 12),
    ("EQUAL", 13),
    ("BACKSPACE", 14),
    ("TAB", 15),
    ("Q", 16),
    ("W", 17),
    ("E", 18),
    ("R", 19),
    ("T", 20),
    ("Y", 21),
    ("U", 22),
    ("I", 23),
    ("O", 24),
    ("P", 25),
    ("LEFT_BRACE", 26),
    ("RIGHT_BRACE", 27),
    ("ENTER", 28),
    ("LEFT_CTRL", 29),
    ("A", 30),
    ("S", 31),
    ("D", 32),
    ("F", 33),
    ("G", 34),
    ("H", 35),
    ("J", 36),
    ("K", 37),
    ("L", 38),
    ("SEMICOLON", 39),
    ("APOSTROPHE", 40),
    ("GRAVE", 41),
    ("LEFT_SHIFT", 42),
    ("BACKSLASH", 43),
    ("Z", 44),
    ("X", 45),
    ("C", 46),
    ("V", 47),
    ("B", 48),
    ("N", 49),
    ("M", 50),
    ("COMMA", 51),
    ("DOT", 52),
    ("SLASH", 53),
    ("RIGHT_SHIFT", 54),
    ("KPASTERISK", 55),
    ("LEFT_ALT", 56),
    ("SPACE", 57),
    ("CAPSLOCK", 58),
    ("F1", 59),
    ("F2", 60),
    ("F3", 61),
    ("F4", 62),
    ("F5", 63),
    ("F6", 64),
    ("F7", 65),
    ("F8", 66),
    ("F9", 67),
    ("F10", 68),
    ("NUMLOCK", 69),
    ("SCROLLLOCK", 70),
    ("F11", 87),
    ("F12", 88),
    ("RIGHT_CTRL", 97),
    ("SYSRQ", 99),
    ("RIGHT_ALT", 100),
    ("HOME", 102),
    ("UP", 103),
    ("PAGE_UP", 104),
    ("LEFT", 105),
    ("RIGHT", 106),
    ("END", 107),
    ("DOWN", 108),
    ("PAGE_DOWN", 109),
    ("INSERT", 110),
    ("DELETE", 111),
    ("MUTE", 113),
    ("VOLUMEDOWN", 114),
    ("VOLUMEUP", 115),
    ("POWER", 116),
    ("PAUSE", 119),
    ("LEFT_META", 125),
    ("RIGHT_META", 126),
    ("MENU", 139),
    ("CAMERA", 212),
    ("BACK", 158),
    ("NEXTSONG", 163),
    ("PLAYPAUSE", 164),
    ("PREVIOUSSONG", 165),
    ("STOPCD", 166),
    ("HOMEPAGE", 172),
    ("SEARCH", 217),
    ("FN", 464),
    ("BTN_SOUTH", 304),
    ("BTN_EAST", 305),
    ("BTN_NORTH", 307),
    ("BTN_WEST", 308),
    ("BTN_TL", 310),
    ("BTN_TR", 311),
    ("BTN_SELECT", 314),
    ("BTN_START", 315),
    ("BTN_MODE", 316),
    ("BTN_THUMBL", 317),
    ("BTN_THUMBR", 318),
    ("DPAD_UP", 544),
    ("DPAD_DOWN", 545),
    ("DPAD_LEFT", 546),
    ("DPAD_RIGHT", 547),
];

fn write_key_type(f: &mut File) -> io::Result<()> {
    writeln!(
        f,
        r#"
/// A key or button code.
///
/// Values follow Linux input-event-codes.h numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Key(pub u16);

impl Key {{
    /// Raw numeric code
    pub fn code(self) -> u16 {{
        self.0
    }}

    /// Display name of this key
    pub fn name(self) -> &'static str {{
        key_name(self.0)
    }}
}}

impl From<u16> for Key {{
    fn from(code: u16) -> Self {{
        Key(code)
    }}
}}

impl From<Key> for u16 {{
    fn from(key: Key) -> Self {{
        key.0
    }}
}}

impl fmt::Display for Key {{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {{
        write!(f, "{{}}", self.name())
    }}
}}

impl FromStr for Key {{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {{
        key_from_name(s).ok_or_else(|| format!("Unknown key: {{}}", s))
    }}
}}
"#
    )?;

    writeln!(f, "#[allow(missing_docs)]\nimpl Key {{")?;
    for (name, code) in KEYS {
        writeln!(f, "    pub const {}: Key = Key({});", name, code)?;
    }
    writeln!(f, "}}")?;

    writeln!(f, "\nstatic KEY_TABLE: &[(&str, u16)] = &[")?;
    for (name, code) in KEYS {
        writeln!(f, "    (\"{}\", {}),", name, code)?;
    }
    writeln!(f, "];")
}

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest_path = Path::new(&out_dir).join("key_codes.rs");
    let mut f = File::create(&dest_path).expect("create key_codes.rs");
    write_key_type(&mut f).expect("write key_codes.rs");

    println!("cargo:rerun-if-changed=build.rs");
}
