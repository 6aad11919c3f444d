// Trigrs Trigger Compiler
// Builds the runtime index over all key maps

use indexmap::IndexSet;

use crate::action::Action;
use crate::constraint::ConstraintState;
use crate::keymap::KeyMap;
use crate::trigger::{ClickType, KeyDevice, Trigger, TriggerKey, TriggerKeyKind, TriggerMode};
use crate::Key;

/// Why a key map was left out of the compiled set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Key map {0} is disabled")]
    Disabled(String),

    #[error("Key map {0} has no trigger keys")]
    NoKeys(String),

    #[error("Key map {0} has no actions")]
    NoActions(String),

    #[error("Key map {uid} has an unresolvable key at position {index}")]
    UnresolvableKey { uid: String, index: usize },
}

/// Position of a key inside the compiled trigger list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyLocation {
    pub trigger: usize,
    pub key: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTrigger {
    pub uid: String,
    pub trigger: Trigger,
    /// Group constraints first, then the key map's own
    pub constraints: Vec<ConstraintState>,
    pub actions: Vec<Action>,
    pub fires_on_key_down: bool,
}

impl CompiledTrigger {
    pub fn keys(&self) -> &[TriggerKey] {
        &self.trigger.keys
    }

    pub fn last_index(&self) -> usize {
        self.trigger.last_index()
    }

    fn has_constraints(&self) -> bool {
        self.constraints.iter().any(|state| !state.is_empty())
    }
}

/// Runtime index over every valid key map.
///
/// Overlap lists are indexed by trigger position and hold the positions of
/// the triggers that overlap it.
#[derive(Debug, Clone, Default)]
pub struct CompiledTriggerSet {
    pub triggers: Vec<CompiledTrigger>,
    /// Triggers whose actions run on the down event of the final key
    pub parallel: Vec<usize>,
    /// Triggers resolved on key-up
    pub sequence: Vec<usize>,
    pub sequence_overlaps_sequence: Vec<Vec<usize>>,
    pub sequence_overlaps_parallel: Vec<Vec<usize>>,
    pub parallel_overlaps_parallel: Vec<Vec<usize>>,
    /// Modifier keys inside parallel triggers
    pub modifier_keys: Vec<KeyLocation>,
    /// Double-press keys of non-parallel triggers
    pub double_press_keys: Vec<KeyLocation>,
    /// Long-press keys of multi-key sequence triggers
    pub long_press_sequence_keys: Vec<TriggerKey>,
    /// Consuming keys delivered by an input method, whose auto-repeated
    /// downs must be swallowed
    pub repeated_down_keys: Vec<TriggerKey>,
    pub detect_internal: bool,
    pub detect_external: bool,
    /// Some action inputs a modifier key
    pub modifier_key_actions: bool,
    pub has_constraints: bool,
}

/// Check that a key map can be compiled.
pub fn validate(key_map: &KeyMap) -> Result<(), CompileError> {
    if !key_map.enabled {
        return Err(CompileError::Disabled(key_map.uid.clone()));
    }
    if key_map.trigger.keys.is_empty() {
        return Err(CompileError::NoKeys(key_map.uid.clone()));
    }
    if key_map.actions.is_empty() {
        return Err(CompileError::NoActions(key_map.uid.clone()));
    }

    let unresolved = key_map.trigger.keys.iter().position(|key| {
        matches!(
            key.kind,
            TriggerKeyKind::KeyCode {
                key: Key::RESERVED,
                scan_code: None,
                ..
            }
        )
    });
    if let Some(index) = unresolved {
        return Err(CompileError::UnresolvableKey {
            uid: key_map.uid.clone(),
            index,
        });
    }

    Ok(())
}

impl CompiledTriggerSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn compile(key_maps: &[KeyMap]) -> Self {
        let mut set = Self::empty();

        for key_map in key_maps {
            match validate(key_map) {
                Ok(()) => {}
                Err(CompileError::Disabled(uid)) => {
                    log::debug!("Skipping disabled key map {}", uid);
                    continue;
                }
                Err(err) => {
                    log::warn!("Rejected key map: {}", err);
                    continue;
                }
            }
            set.push(key_map);
        }

        set.compute_overlaps();
        set.compute_modifier_keys();

        log::debug!(
            "Compiled {} triggers ({} parallel, {} sequence), {} overlap edges",
            set.triggers.len(),
            set.parallel.len(),
            set.sequence.len(),
            set.overlap_edge_count()
        );

        set
    }

    fn push(&mut self, key_map: &KeyMap) {
        let index = self.triggers.len();
        let trigger = &key_map.trigger;

        for (key_index, key) in trigger.keys.iter().enumerate() {
            if let TriggerKeyKind::KeyCode {
                device,
                from_input_method,
                ..
            } = &key.kind
            {
                if *from_input_method && key.consume() {
                    self.repeated_down_keys.push(key.clone());
                }

                match device {
                    KeyDevice::Any => {
                        self.detect_internal = true;
                        self.detect_external = true;
                    }
                    KeyDevice::Internal => self.detect_internal = true,
                    KeyDevice::External { .. } => self.detect_external = true,
                }

                if trigger.mode == TriggerMode::Sequence
                    && key.click_type == ClickType::LongPress
                    && trigger.keys.len() > 1
                {
                    self.long_press_sequence_keys.push(key.clone());
                }
            }

            if trigger.mode != TriggerMode::Parallel && key.click_type == ClickType::DoublePress {
                self.double_press_keys.push(KeyLocation {
                    trigger: index,
                    key: key_index,
                });
            }
        }

        if key_map.actions.iter().any(|a| a.data.is_modifier_key()) {
            self.modifier_key_actions = true;
        }

        let compiled = CompiledTrigger {
            uid: key_map.uid.clone(),
            trigger: trigger.clone(),
            constraints: key_map.constraint_chain(),
            actions: key_map.actions.clone(),
            fires_on_key_down: trigger.fires_on_key_down(),
        };

        if compiled.has_constraints() {
            self.has_constraints = true;
        }

        if compiled.fires_on_key_down {
            self.parallel.push(index);
        } else {
            self.sequence.push(index);
        }

        self.triggers.push(compiled);
    }

    fn compute_overlaps(&mut self) {
        let count = self.triggers.len();
        let mut seq_seq: Vec<IndexSet<usize>> = vec![IndexSet::new(); count];
        let mut seq_par: Vec<IndexSet<usize>> = vec![IndexSet::new(); count];
        let mut par_par: Vec<IndexSet<usize>> = vec![IndexSet::new(); count];

        // A sequence trigger whose keys appear in order inside another sequence
        // trigger, starting after that trigger's first key.
        for &t in &self.sequence {
            let keys = self.triggers[t].keys();
            let last = self.triggers[t].last_index();

            'other: for &o in &self.sequence {
                let other_keys = self.triggers[o].keys();

                for (key_index, key) in keys.iter().enumerate() {
                    let mut last_matched: Option<usize> = None;

                    for (other_index, other_key) in other_keys.iter().enumerate() {
                        if key.matches_other_key(other_key) {
                            if other_index == 0 {
                                continue 'other;
                            }
                            if last_matched.is_some_and(|m| m + 1 != other_index) {
                                continue 'other;
                            }
                            if key_index == last {
                                seq_seq[t].insert(o);
                            }
                            last_matched = Some(other_index);
                        }
                    }
                }
            }
        }

        for &t in &self.parallel {
            let keys = self.triggers[t].keys();
            let last = self.triggers[t].last_index();

            'other: for &o in &self.sequence {
                if t == o {
                    continue;
                }
                let other_keys = self.triggers[o].keys();
                let other_last = self.triggers[o].last_index();

                for (key_index, key) in keys.iter().enumerate() {
                    let mut last_matched: Option<usize> = None;

                    for (other_index, other_key) in other_keys.iter().enumerate() {
                        if key.matches_other_key(other_key) {
                            if last_matched.is_some_and(|m| m + 1 != other_index) {
                                continue 'other;
                            }
                            if key_index == last {
                                seq_par[t].insert(o);
                            }
                            last_matched = Some(other_index);
                        }

                        if last_matched.is_none() && other_index == other_last {
                            continue 'other;
                        }
                    }
                }
            }
        }

        for &t in &self.parallel {
            let keys = self.triggers[t].keys();
            let last = self.triggers[t].last_index();

            'other: for &o in &self.parallel {
                if t == o {
                    continue;
                }
                let other_keys = self.triggers[o].keys();
                if other_keys.len() <= keys.len() {
                    continue;
                }
                let other_last = self.triggers[o].last_index();

                for (key_index, key) in keys.iter().enumerate() {
                    let mut last_matched: Option<usize> = None;

                    for (other_index, other_key) in other_keys.iter().enumerate() {
                        if other_key.matches_other_key(key) {
                            if last_matched.is_some_and(|m| m + 1 != other_index) {
                                continue 'other;
                            }
                            if key_index == last {
                                par_par[t].insert(o);
                            }
                            last_matched = Some(other_index);
                        }

                        if last_matched.is_none() && other_index == other_last {
                            continue 'other;
                        }
                    }
                }
            }
        }

        let into_vecs = |sets: Vec<IndexSet<usize>>| -> Vec<Vec<usize>> {
            sets.into_iter().map(|s| s.into_iter().collect()).collect()
        };
        self.sequence_overlaps_sequence = into_vecs(seq_seq);
        self.sequence_overlaps_parallel = into_vecs(seq_par);
        self.parallel_overlaps_parallel = into_vecs(par_par);
    }

    fn compute_modifier_keys(&mut self) {
        for &t in &self.parallel {
            for (key_index, key) in self.triggers[t].keys().iter().enumerate() {
                if key.key_code().is_some_and(Key::is_modifier) {
                    self.modifier_keys.push(KeyLocation {
                        trigger: t,
                        key: key_index,
                    });
                }
            }
        }
    }

    fn overlap_edge_count(&self) -> usize {
        [
            &self.sequence_overlaps_sequence,
            &self.sequence_overlaps_parallel,
            &self.parallel_overlaps_parallel,
        ]
        .iter()
        .flat_map(|lists| lists.iter())
        .map(Vec::len)
        .sum()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn key_at(&self, location: KeyLocation) -> &TriggerKey {
        &self.triggers[location.trigger].trigger.keys[location.key]
    }

    /// Position of the trigger compiled from the key map `uid`
    pub fn position(&self, uid: &str) -> Option<usize> {
        self.triggers.iter().position(|t| t.uid == uid)
    }
}
