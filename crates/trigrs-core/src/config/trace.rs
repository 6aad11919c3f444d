// Trigrs Event Traces
// Scripted input for replaying against an engine on a virtual clock

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::parser::{parse_key, ConfigError};
use crate::event::{
    AssistantType, DeviceInfo, FingerprintGesture, GamePadEvent, InputEvent, KeyAction, KeyEvent,
};

/// How long to keep the clock running after the last event by default
const DEFAULT_TAIL_MS: u64 = 2000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraceToml {
    tail_ms: Option<u64>,
    #[serde(default)]
    event: Vec<TraceEventToml>,
}

/// One scripted event. Exactly one of `key`, `assistant`, `fingerprint`,
/// `floating_button` or `motion` says what happens.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraceEventToml {
    at_ms: u64,
    key: Option<String>,
    assistant: Option<AssistantType>,
    fingerprint: Option<FingerprintGesture>,
    floating_button: Option<String>,
    /// DPAD hat axes as `[x, y]`
    motion: Option<[f32; 2]>,
    /// "down" or "up"; keys and floating buttons only
    action: Option<String>,
    /// "internal" (default) or "external:<descriptor>"
    device: Option<String>,
    #[serde(default)]
    scan_code: u16,
    #[serde(default)]
    repeat_count: u32,
}

/// Input the trace feeds to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum TraceInput {
    Event(InputEvent),
    Motion(GamePadEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    /// Offset from the start of the trace
    pub at: Duration,
    pub input: TraceInput,
}

/// A parsed trace, ordered by time.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
    /// Clock time to run after the last step
    pub tail: Duration,
}

impl Trace {
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: TraceToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;

        let mut steps = raw
            .event
            .iter()
            .enumerate()
            .map(|(index, event)| {
                event.to_step().map_err(|e| match e {
                    ConfigError::InvalidValue(msg) => {
                        ConfigError::InvalidValue(format!("event {}: {}", index, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        steps.sort_by_key(|step| step.at);

        Ok(Self {
            steps,
            tail: Duration::from_millis(raw.tail_ms.unwrap_or(DEFAULT_TAIL_MS)),
        })
    }

    /// Time of the last step plus the tail
    pub fn duration(&self) -> Duration {
        self.steps.last().map_or(Duration::ZERO, |step| step.at) + self.tail
    }
}

fn parse_action(value: Option<&str>) -> Result<KeyAction, ConfigError> {
    match value {
        Some("down") => Ok(KeyAction::Down),
        Some("up") => Ok(KeyAction::Up),
        Some(other) => Err(ConfigError::InvalidValue(format!("action '{}'", other))),
        None => Err(ConfigError::InvalidValue("missing action".into())),
    }
}

fn parse_device(value: Option<&str>) -> Result<DeviceInfo, ConfigError> {
    match value {
        None | Some("internal") => Ok(DeviceInfo::internal(0, "internal")),
        Some(value) => match value.strip_prefix("external:") {
            Some(descriptor) if !descriptor.is_empty() => {
                Ok(DeviceInfo::external(1, descriptor, descriptor))
            }
            _ => Err(ConfigError::InvalidValue(format!("device '{}'", value))),
        },
    }
}

impl TraceEventToml {
    fn to_step(&self) -> Result<TraceStep, ConfigError> {
        let sources = [
            self.key.is_some(),
            self.assistant.is_some(),
            self.fingerprint.is_some(),
            self.floating_button.is_some(),
            self.motion.is_some(),
        ];
        if sources.iter().filter(|s| **s).count() != 1 {
            return Err(ConfigError::InvalidValue(
                "needs exactly one of key, assistant, fingerprint, floating_button or motion".into(),
            ));
        }

        let input = if let Some(name) = &self.key {
            let event = KeyEvent::new(
                parse_key(name)?,
                parse_action(self.action.as_deref())?,
                parse_device(self.device.as_deref())?,
            )
            .with_scan_code(self.scan_code)
            .with_repeat_count(self.repeat_count);
            TraceInput::Event(InputEvent::Key(event))
        } else if let Some(kind) = self.assistant {
            TraceInput::Event(InputEvent::Assistant(kind))
        } else if let Some(gesture) = self.fingerprint {
            TraceInput::Event(InputEvent::Fingerprint(gesture))
        } else if let Some(uid) = &self.floating_button {
            TraceInput::Event(InputEvent::FloatingButton {
                uid: uid.clone(),
                action: parse_action(self.action.as_deref())?,
            })
        } else if let Some([x, y]) = self.motion {
            let device = parse_device(self.device.as_deref())?;
            TraceInput::Motion(GamePadEvent::new(device, x, y))
        } else {
            return Err(ConfigError::InvalidValue("event has no source".into()));
        };

        Ok(TraceStep {
            at: Duration::from_millis(self.at_ms),
            input,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Key;

    #[test]
    fn test_trace_sorted_by_time() {
        let trace = Trace::from_toml(
            r#"
tail_ms = 500

[[event]]
at_ms = 120
key = "A"
action = "up"

[[event]]
at_ms = 0
key = "A"
action = "down"

[[event]]
at_ms = 300
fingerprint = "swipe_left"
"#,
        )
        .unwrap();

        assert_eq!(trace.steps.len(), 3);
        assert_eq!(trace.steps[0].at, Duration::ZERO);
        assert_eq!(
            trace.steps[0].input,
            TraceInput::Event(InputEvent::Key(KeyEvent::down(
                Key::A,
                DeviceInfo::internal(0, "internal")
            )))
        );
        assert_eq!(trace.duration(), Duration::from_millis(800));
    }

    #[test]
    fn test_motion_and_external_device() {
        let trace = Trace::from_toml(
            r#"
[[event]]
at_ms = 10
motion = [-1.0, 0.0]
device = "external:pad"
"#,
        )
        .unwrap();

        match &trace.steps[0].input {
            TraceInput::Motion(motion) => {
                assert!(motion.device.is_external);
                assert_eq!(motion.axis_hat_x, -1.0);
            }
            other => panic!("unexpected input {:?}", other),
        }
        assert_eq!(trace.tail, Duration::from_millis(DEFAULT_TAIL_MS));
    }

    #[test]
    fn test_invalid_events_rejected() {
        let missing_action = Trace::from_toml("[[event]]\nat_ms = 0\nkey = \"A\"");
        assert!(matches!(missing_action, Err(ConfigError::InvalidValue(_))));

        let two_sources =
            Trace::from_toml("[[event]]\nat_ms = 0\nkey = \"A\"\naction = \"down\"\nassistant = \"voice\"");
        assert!(matches!(two_sources, Err(ConfigError::InvalidValue(_))));
    }
}
