// Trigrs Host Contract
// Everything the engine asks of the program embedding it

use std::time::Duration;

use crate::action::{ActionData, InputEventAction};
use crate::constraint::{AlwaysSatisfied, ConstraintSnapshot};
use crate::event::{KeyEvent, MetaState};

/// Why an action cannot currently run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    #[error("Action failed: {0}")]
    Other(String),
}

/// The side of the engine that touches the outside world.
///
/// Calls are made from whichever thread drives the engine, always serially.
pub trait Host {
    /// Execute an action phase.
    fn perform(&mut self, action: &ActionData, input_action: InputEventAction, meta_state: MetaState);

    /// Replay a physical key event that no trigger claimed. The meta state
    /// to use is carried in `event`.
    fn resynthesize(&mut self, event: &KeyEvent, input_action: InputEventAction);

    /// Checked before a trigger fires. Any error suppresses the trigger's
    /// whole action list.
    fn action_error(&self, _action: &ActionData) -> Option<ActionError> {
        None
    }

    fn vibrate(&mut self, _duration: Duration) {}

    fn show_triggered_toast(&mut self) {}

    fn constraint_snapshot(&self) -> Box<dyn ConstraintSnapshot + '_> {
        Box::new(AlwaysSatisfied)
    }
}
