// Trigrs Constraints
// Preconditions gating whether a trigger may fire

use std::collections::HashSet;

use serde::Deserialize;
use strum_macros::{Display, EnumString};

/// A single boolean precondition, evaluated by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Constraint {
    ForegroundApp(String),
    NotForegroundApp(String),
    MediaPlaying,
    NoMediaPlaying,
    ScreenOn,
    ScreenOff,
    DeviceLocked,
    DeviceUnlocked,
    /// A host-defined named condition
    Flag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintMode {
    #[default]
    And,
    Or,
}

/// A list of constraints and how they combine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstraintState {
    pub constraints: Vec<Constraint>,
    pub mode: ConstraintMode,
}

impl ConstraintState {
    pub fn new(constraints: Vec<Constraint>, mode: ConstraintMode) -> Self {
        Self { constraints, mode }
    }

    pub fn all(constraints: Vec<Constraint>) -> Self {
        Self::new(constraints, ConstraintMode::And)
    }

    pub fn any(constraints: Vec<Constraint>) -> Self {
        Self::new(constraints, ConstraintMode::Or)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// A point-in-time view of the host used to evaluate constraints.
pub trait ConstraintSnapshot {
    fn is_constraint_satisfied(&self, constraint: &Constraint) -> bool;

    /// Every state must hold. An empty OR state counts as satisfied.
    fn is_satisfied(&self, states: &[ConstraintState]) -> bool {
        states.iter().all(|state| match state.mode {
            ConstraintMode::And => state
                .constraints
                .iter()
                .all(|c| self.is_constraint_satisfied(c)),
            ConstraintMode::Or => {
                state.constraints.is_empty()
                    || state
                        .constraints
                        .iter()
                        .any(|c| self.is_constraint_satisfied(c))
            }
        })
    }
}

/// Snapshot for hosts without constraint support.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSatisfied;

impl ConstraintSnapshot for AlwaysSatisfied {
    fn is_constraint_satisfied(&self, _constraint: &Constraint) -> bool {
        true
    }
}

/// A snapshot built from plain values, used by the replay harness and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticConstraintSnapshot {
    pub foreground_app: Option<String>,
    pub media_playing: bool,
    pub screen_on: bool,
    pub locked: bool,
    pub flags: HashSet<String>,
}

impl StaticConstraintSnapshot {
    pub fn with_foreground_app(mut self, app: impl Into<String>) -> Self {
        self.foreground_app = Some(app.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }
}

impl ConstraintSnapshot for StaticConstraintSnapshot {
    fn is_constraint_satisfied(&self, constraint: &Constraint) -> bool {
        match constraint {
            Constraint::ForegroundApp(app) => self.foreground_app.as_deref() == Some(app.as_str()),
            Constraint::NotForegroundApp(app) => {
                self.foreground_app.as_deref() != Some(app.as_str())
            }
            Constraint::MediaPlaying => self.media_playing,
            Constraint::NoMediaPlaying => !self.media_playing,
            Constraint::ScreenOn => self.screen_on,
            Constraint::ScreenOff => !self.screen_on,
            Constraint::DeviceLocked => self.locked,
            Constraint::DeviceUnlocked => !self.locked,
            Constraint::Flag(name) => self.flags.contains(name),
        }
    }
}
