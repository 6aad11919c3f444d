// Trigrs Test Support
//
// A host that records everything the engine asks of it, and helpers for
// driving an engine on a manual clock.

#![allow(dead_code)]

use std::time::Duration;

use trigrs_core::{
    ActionData, ActionError, ConstraintSnapshot, DeviceInfo, Host, InputEventAction, Key, KeyEvent,
    KeyMap, ManualClock, MetaState, StaticConstraintSnapshot, TriggerEngine,
};

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub performed: Vec<(ActionData, InputEventAction, MetaState)>,
    pub resynthesized: Vec<(KeyEvent, InputEventAction)>,
    pub vibrations: Vec<Duration>,
    pub toasts: usize,
    pub snapshot: StaticConstraintSnapshot,
    /// Actions reported as unable to run
    pub blocked: Vec<ActionData>,
}

impl RecordingHost {
    /// Performed actions without their meta state
    pub fn actions(&self) -> Vec<(ActionData, InputEventAction)> {
        self.performed
            .iter()
            .map(|(data, action, _)| (data.clone(), *action))
            .collect()
    }

    /// Keys replayed to the system with how they were replayed
    pub fn replayed(&self) -> Vec<(Key, InputEventAction)> {
        self.resynthesized
            .iter()
            .map(|(event, action)| (event.key, *action))
            .collect()
    }
}

impl Host for RecordingHost {
    fn perform(&mut self, action: &ActionData, input_action: InputEventAction, meta_state: MetaState) {
        self.performed.push((action.clone(), input_action, meta_state));
    }

    fn resynthesize(&mut self, event: &KeyEvent, input_action: InputEventAction) {
        self.resynthesized.push((event.clone(), input_action));
    }

    fn action_error(&self, action: &ActionData) -> Option<ActionError> {
        self.blocked
            .contains(action)
            .then(|| ActionError::PermissionDenied(action.to_string()))
    }

    fn vibrate(&mut self, duration: Duration) {
        self.vibrations.push(duration);
    }

    fn show_triggered_toast(&mut self) {
        self.toasts += 1;
    }

    fn constraint_snapshot(&self) -> Box<dyn ConstraintSnapshot + '_> {
        Box::new(self.snapshot.clone())
    }
}

pub type TestEngine = TriggerEngine<RecordingHost, ManualClock>;

pub fn engine(key_maps: &[KeyMap]) -> TestEngine {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut engine = TriggerEngine::with_clock(RecordingHost::default(), ManualClock::new());
    engine.load_key_maps(key_maps);
    engine
}

pub fn keyboard() -> DeviceInfo {
    DeviceInfo::internal(0, "keyboard")
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn down(engine: &mut TestEngine, key: Key) -> bool {
    engine.on_key_event(&KeyEvent::down(key, keyboard()))
}

pub fn up(engine: &mut TestEngine, key: Key) -> bool {
    engine.on_key_event(&KeyEvent::up(key, keyboard()))
}

/// Press and release `key`, holding it for `held`
pub fn tap(engine: &mut TestEngine, key: Key, held: Duration) -> (bool, bool) {
    let consumed_down = down(engine, key);
    engine.advance_by(held);
    let consumed_up = up(engine, key);
    (consumed_down, consumed_up)
}

pub fn key_action(key: Key, action: InputEventAction) -> (ActionData, InputEventAction) {
    (ActionData::key(key), action)
}
