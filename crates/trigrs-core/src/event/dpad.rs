// Trigrs DPAD Motion Tracker
// Converts game controller hat-axis motion into DPAD key events

use std::collections::HashMap;

use bitflags::bitflags;
use smallvec::SmallVec;

use super::{DeviceInfo, KeyAction, KeyEvent, MetaState};
use crate::Key;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    struct DpadButtons: u8 {
        const LEFT = 0b0001;
        const RIGHT = 0b0010;
        const UP = 0b0100;
        const DOWN = 0b1000;
    }
}

const BUTTON_KEYS: [(DpadButtons, Key); 4] = [
    (DpadButtons::LEFT, Key::DPAD_LEFT),
    (DpadButtons::RIGHT, Key::DPAD_RIGHT),
    (DpadButtons::UP, Key::DPAD_UP),
    (DpadButtons::DOWN, Key::DPAD_DOWN),
];

/// A motion event from a game controller.
#[derive(Debug, Clone, PartialEq)]
pub struct GamePadEvent {
    pub device: DeviceInfo,
    pub axis_hat_x: f32,
    pub axis_hat_y: f32,
    pub meta_state: MetaState,
}

impl GamePadEvent {
    pub fn new(device: DeviceInfo, axis_hat_x: f32, axis_hat_y: f32) -> Self {
        Self {
            device,
            axis_hat_x,
            axis_hat_y,
            meta_state: MetaState::empty(),
        }
    }

    fn buttons(&self) -> DpadButtons {
        let mut buttons = DpadButtons::empty();
        if self.axis_hat_x < 0.0 {
            buttons |= DpadButtons::LEFT;
        } else if self.axis_hat_x > 0.0 {
            buttons |= DpadButtons::RIGHT;
        }
        if self.axis_hat_y < 0.0 {
            buttons |= DpadButtons::UP;
        } else if self.axis_hat_y > 0.0 {
            buttons |= DpadButtons::DOWN;
        }
        buttons
    }
}

/// Some controllers report the DPAD only as hat-axis motion, others send key
/// events as well. Motion is converted into key events here, and key events
/// for a direction already held through motion are swallowed.
#[derive(Debug, Default)]
pub struct DpadTracker {
    /// Pressed directions per device descriptor
    pressed: HashMap<String, DpadButtons>,
}

impl DpadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key events for every direction that changed since the last motion
    /// event from the same device. Releases are reported before presses.
    pub fn convert_motion_event(&mut self, event: &GamePadEvent) -> SmallVec<[KeyEvent; 4]> {
        let now_pressed = event.buttons();
        let before = self
            .pressed
            .insert(event.device.descriptor.clone(), now_pressed)
            .unwrap_or_default();

        let released = before - now_pressed;
        let pressed = now_pressed - before;

        let mut events = SmallVec::new();
        for (action, changed) in [(KeyAction::Up, released), (KeyAction::Down, pressed)] {
            for (button, key) in BUTTON_KEYS {
                if changed.contains(button) {
                    events.push(
                        KeyEvent::new(key, action, event.device.clone())
                            .with_meta_state(event.meta_state),
                    );
                }
            }
        }
        events
    }

    /// Whether a key event should be consumed because its direction is
    /// already held through motion on the same device.
    pub fn on_key_event(&self, event: &KeyEvent) -> bool {
        let Some(pressed) = self.pressed.get(&event.device.descriptor) else {
            return false;
        };
        BUTTON_KEYS
            .iter()
            .any(|(button, key)| *key == event.key && pressed.contains(*button))
    }

    pub fn reset(&mut self) {
        self.pressed.clear();
    }
}
