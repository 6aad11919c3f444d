// Trigrs Key Maps
// A trigger bound to its constraints and action list

use crate::action::Action;
use crate::constraint::ConstraintState;
use crate::trigger::Trigger;

/// One configured mapping as handed to the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMap {
    pub uid: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub constraints: ConstraintState,
    /// Constraint states inherited from enclosing groups, outermost first
    pub group_constraints: Vec<ConstraintState>,
    pub actions: Vec<Action>,
}

impl KeyMap {
    pub fn new(uid: impl Into<String>, trigger: Trigger, actions: Vec<Action>) -> Self {
        Self {
            uid: uid.into(),
            enabled: true,
            trigger,
            constraints: ConstraintState::default(),
            group_constraints: Vec::new(),
            actions,
        }
    }

    pub fn with_constraints(mut self, constraints: ConstraintState) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_group_constraints(mut self, groups: Vec<ConstraintState>) -> Self {
        self.group_constraints = groups;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Group constraints followed by the key map's own
    pub fn constraint_chain(&self) -> Vec<ConstraintState> {
        self.group_constraints
            .iter()
            .cloned()
            .chain(std::iter::once(self.constraints.clone()))
            .collect()
    }
}
