// Trigrs Deferred Work
// Timed tasks the matcher schedules and runs once they fall due

use std::time::{Duration, Instant};

use super::state::DoublePressPhase;
use super::{Feedback, TriggerEngine};
use crate::action::InputEventAction;
use crate::event::{KeyEvent, MatchEvent};
use crate::host::Host;
use crate::perform::PerformerTask;
use crate::scheduler::TaskId;
use crate::timing::Clock;
use crate::trigger::ClickType;

/// Delay before a key re-synthesized with action meta state starts repeating
pub(crate) const IMITATE_REPEAT_DELAY: Duration = Duration::from_millis(400);
pub(crate) const IMITATE_REPEAT_RATE: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub(crate) struct Scheduled {
    /// Tasks from an older generation are dropped unrun
    pub generation: u64,
    pub deferred: Deferred,
}

#[derive(Debug, Clone)]
pub(crate) enum Deferred {
    /// A parallel trigger's long-press key was held long enough
    LongPress { trigger: usize },
    /// A parallel trigger waited for an overlapping sequence to time out
    AfterSequenceTimeout { trigger: usize, sequence: usize },
    /// A partially matched sequence trigger ran out of time
    SequenceTimeout { trigger: usize },
    /// The second press of a double press never came
    DoublePressBounce { slot: usize, event: MatchEvent },
    /// Next auto-repeat of a key re-synthesized with action meta state
    ImitateRepeat { event: KeyEvent },
    Perform { trigger: usize, task: PerformerTask },
}

impl<H: Host, C: Clock> TriggerEngine<H, C> {
    pub(super) fn run_deferred(&mut self, id: TaskId, deferred: Deferred, now: Instant) {
        match deferred {
            Deferred::LongPress { trigger } => self.run_long_press(id, trigger, now),
            Deferred::AfterSequenceTimeout { trigger, sequence } => {
                self.run_after_sequence_timeout(id, trigger, sequence, now)
            }
            Deferred::SequenceTimeout { trigger } => self.run_sequence_timeout(id, trigger),
            Deferred::DoublePressBounce { slot, event } => {
                self.run_double_press_bounce(id, slot, &event, now)
            }
            Deferred::ImitateRepeat { event } => self.run_imitate_repeat(id, event, now),
            Deferred::Perform { trigger, task } => {
                if let Some((performer, mut ctx)) = self.perform_context(trigger, now) {
                    performer.run_task(&mut ctx, id, task);
                }
            }
        }
    }

    fn run_long_press(&mut self, id: TaskId, trigger: usize, now: Instant) {
        let Some(state) = self.state.triggers.get_mut(trigger) else {
            return;
        };
        if state.long_press_task != Some(id) {
            log::trace!("Discarding stale long press for trigger {}", trigger);
            return;
        }
        state.long_press_task = None;

        let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
        if self.fire_parallel(trigger, false, meta, now) {
            self.deferred_feedback(trigger);
        }
    }

    fn run_after_sequence_timeout(&mut self, id: TaskId, trigger: usize, sequence: usize, now: Instant) {
        let Some(state) = self.state.triggers.get_mut(trigger) else {
            return;
        };
        if state.after_sequence_task != Some(id) {
            log::trace!("Discarding stale sequence wait for trigger {}", trigger);
            return;
        }
        state.after_sequence_task = None;

        if self.state.triggers[sequence].last_matched.is_none() {
            log::debug!(
                "Sequence {} finished first, dropping {}",
                self.compiled.triggers[sequence].uid,
                self.compiled.triggers[trigger].uid
            );
            return;
        }

        self.state.claim_replay(sequence);
        let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
        if self.fire_parallel(trigger, true, meta, now) {
            self.deferred_feedback(trigger);
        }
    }

    fn run_sequence_timeout(&mut self, id: TaskId, trigger: usize) {
        let Some(state) = self.state.triggers.get_mut(trigger) else {
            return;
        };
        if state.sequence_timeout_task != Some(id) {
            log::trace!("Discarding stale sequence timeout for trigger {}", trigger);
            return;
        }
        state.sequence_timeout_task = None;
        state.last_matched = None;
        state.sequence_deadline = None;

        self.expire_sequence(trigger);
    }

    fn run_double_press_bounce(&mut self, id: TaskId, slot: usize, event: &MatchEvent, now: Instant) {
        let Some(state) = self.state.double_press.get_mut(slot) else {
            return;
        };
        if state.bounce_task != Some(id) {
            log::trace!("Discarding stale double press timeout for slot {}", slot);
            return;
        }
        state.bounce_task = None;

        if !matches!(state.phase, DoublePressPhase::SinglePressed { .. }) {
            return;
        }

        if self.fire_failed_double_press(event, now) {
            return;
        }

        if let MatchEvent::Key(key_event) = event {
            log::debug!("Double press of {} timed out, replaying", key_event.key);
            self.host.resynthesize(key_event, InputEventAction::DownUp);
        }
    }

    /// Fire the short-press triggers that waited on a double press which
    /// never happened. Returns whether any of them belonged to `event`.
    fn fire_failed_double_press(&mut self, event: &MatchEvent, now: Instant) -> bool {
        let pending: Vec<usize> = self.state.failed_double_press.drain(..).collect();
        let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
        let mut feedback = Feedback::default();
        let mut detected = false;

        for trigger in pending {
            let released = self.compiled.triggers[trigger]
                .keys()
                .last()
                .is_some_and(|key| key.matches(event, ClickType::ShortPress));
            if !released {
                continue;
            }
            detected = true;
            if self.fire_parallel(trigger, true, meta, now) {
                feedback.add_fired(&self.compiled.triggers[trigger].trigger, &self.settings);
            }
        }

        self.emit_feedback(feedback);
        detected
    }

    fn run_imitate_repeat(&mut self, id: TaskId, event: KeyEvent, now: Instant) {
        if self.state.keys_to_imitate_up.get(&event.key) != Some(&id) {
            return;
        }

        let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
        let repeat_count = event.repeat_count + 1;
        let repeat = event.with_meta_state(meta).with_repeat_count(repeat_count);
        self.host.resynthesize(&repeat, InputEventAction::Down);

        let key = repeat.key;
        let task = self.schedule(now + IMITATE_REPEAT_RATE, Deferred::ImitateRepeat { event: repeat });
        self.state.keys_to_imitate_up.insert(key, task);
    }
}
