// Trigrs Matcher State
// Mutable per-trigger progress, rebuilt whenever the compiled set changes

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use smallvec::{smallvec, SmallVec};

use crate::compiler::CompiledTriggerSet;
use crate::event::{KeyEvent, MetaState, PressId};
use crate::scheduler::TaskId;
use crate::Key;

#[derive(Debug, Clone, Default)]
pub(crate) struct TriggerState {
    /// Index of the last matched key, `None` while idle
    pub last_matched: Option<usize>,
    /// Keys of a parallel trigger that are pressed and not yet released
    pub awaiting_release: SmallVec<[bool; 4]>,
    /// A parallel trigger fired and some of its keys are still held
    pub awaiting_release_after_fired: bool,
    pub sequence_deadline: Option<Instant>,
    pub sequence_timeout_task: Option<TaskId>,
    pub long_press_task: Option<TaskId>,
    pub after_sequence_task: Option<TaskId>,
}

impl TriggerState {
    fn new(key_count: usize) -> Self {
        Self {
            awaiting_release: smallvec![false; key_count],
            ..Default::default()
        }
    }

    pub fn next_index(&self) -> usize {
        self.last_matched.map_or(0, |index| index + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DoublePressPhase {
    #[default]
    NotPressed,
    SinglePressed {
        deadline: Instant,
    },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DoublePressState {
    pub phase: DoublePressPhase,
    /// Replays the key if the second press never comes
    pub bounce_task: Option<TaskId>,
}

/// A consumed key press that only partially matched sequence triggers.
#[derive(Debug, Clone)]
pub(crate) struct ReplayEntry {
    pub event: KeyEvent,
    /// Sequence triggers still able to claim the press
    pub owners: SmallVec<[usize; 2]>,
}

#[derive(Debug, Default)]
pub(crate) struct MatcherState {
    pub triggers: Vec<TriggerState>,
    /// Parallel to `CompiledTriggerSet::double_press_keys`
    pub double_press: Vec<DoublePressState>,
    /// Short-press triggers to fire once a competing long press fails
    pub failed_long_press: IndexSet<usize>,
    /// Short-press triggers to fire once a competing double press fails
    pub failed_double_press: IndexSet<usize>,
    /// Keys re-synthesized with action meta state, with their repeat task
    pub keys_to_imitate_up: IndexMap<Key, TaskId>,
    pub meta_from_actions: MetaState,
    pub meta_from_key_event: MetaState,
    pub down_times: HashMap<PressId, Instant>,
    pub consumed_downs: HashSet<PressId>,
    pub sequence_replay: Vec<ReplayEntry>,
}

impl MatcherState {
    pub fn new(compiled: &CompiledTriggerSet) -> Self {
        Self {
            triggers: compiled
                .triggers
                .iter()
                .map(|t| TriggerState::new(t.trigger.keys.len()))
                .collect(),
            double_press: vec![DoublePressState::default(); compiled.double_press_keys.len()],
            ..Default::default()
        }
    }

    /// Forget `trigger` as an owner of pending presses. Returns the presses
    /// no sequence trigger can claim any more, oldest first.
    pub fn release_replay_owner(&mut self, trigger: usize) -> Vec<KeyEvent> {
        let mut unclaimed = Vec::new();
        self.sequence_replay.retain_mut(|entry| {
            entry.owners.retain(|owner| *owner != trigger);
            if entry.owners.is_empty() {
                unclaimed.push(entry.event.clone());
                false
            } else {
                true
            }
        });
        unclaimed
    }

    /// Drop the presses `trigger` used when it completed
    pub fn claim_replay(&mut self, trigger: usize) {
        self.sequence_replay
            .retain(|entry| !entry.owners.contains(&trigger));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceInfo;

    fn entry(key: Key, owners: &[usize]) -> ReplayEntry {
        ReplayEntry {
            event: KeyEvent::up(key, DeviceInfo::internal(0, "kbd")),
            owners: owners.iter().copied().collect(),
        }
    }

    #[test]
    fn test_next_index() {
        let mut state = TriggerState::new(2);
        assert_eq!(state.next_index(), 0);
        state.last_matched = Some(0);
        assert_eq!(state.next_index(), 1);
        assert_eq!(state.awaiting_release.len(), 2);
    }

    #[test]
    fn test_replay_released_when_last_owner_expires() {
        let mut state = MatcherState::default();
        state.sequence_replay = vec![entry(Key::A, &[1, 2]), entry(Key::B, &[2])];

        assert!(state.release_replay_owner(1).is_empty());

        let unclaimed = state.release_replay_owner(2);
        let keys: Vec<Key> = unclaimed.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![Key::A, Key::B]);
        assert!(state.sequence_replay.is_empty());
    }

    #[test]
    fn test_claim_drops_owned_entries() {
        let mut state = MatcherState::default();
        state.sequence_replay = vec![entry(Key::A, &[1, 2]), entry(Key::C, &[3])];

        state.claim_replay(2);
        assert_eq!(state.sequence_replay.len(), 1);
        assert_eq!(state.sequence_replay[0].event.key, Key::C);
    }
}
