// Trigrs Core Library
// Trigger detection and action dispatch for input remapping

pub mod action;
pub mod compiler;
pub mod constraint;
pub mod event;
pub mod host;
pub mod key;
pub mod keymap;
pub mod matcher;
pub mod perform;
pub mod runtime;
pub mod scheduler;
pub mod settings;
pub mod timing;
pub mod trigger;

#[cfg(feature = "toml-config")]
pub mod config;

pub use action::{Action, ActionData, InputEventAction, RepeatMode};
pub use compiler::{CompileError, CompiledTriggerSet};
pub use constraint::{
    AlwaysSatisfied, Constraint, ConstraintMode, ConstraintSnapshot, ConstraintState,
    StaticConstraintSnapshot,
};
pub use event::{
    AssistantType, DeviceInfo, DpadTracker, FingerprintGesture, GamePadEvent, InputEvent,
    KeyAction, KeyEvent, MetaState,
};
pub use host::{ActionError, Host};
pub use key::Key;
pub use keymap::KeyMap;
pub use matcher::TriggerEngine;
pub use runtime::Runtime;
pub use settings::{Settings, SettingsError};
pub use timing::{Clock, ManualClock, SystemClock};
pub use trigger::{ClickType, KeyDevice, Trigger, TriggerKey, TriggerKeyKind, TriggerMode};

#[cfg(feature = "toml-config")]
pub use config::{Config, ConfigError, Trace, TraceInput, TraceStep};
