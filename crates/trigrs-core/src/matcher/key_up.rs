// Trigrs Key Up
// Resolve sequence, double-press and long-press triggers on release

use std::sync::Arc;
use std::time::Duration;

use smallvec::SmallVec;

use super::deferred::Deferred;
use super::state::{DoublePressPhase, ReplayEntry};
use super::{Feedback, KeyUpOutcome, TriggerEngine};
use crate::action::InputEventAction;
use crate::event::{MatchEvent, MetaState};
use crate::host::Host;
use crate::timing::{self, Clock};
use crate::trigger::ClickType;

impl<H: Host, C: Clock> TriggerEngine<H, C> {
    pub(super) fn on_key_up(&mut self, event: &MatchEvent) -> KeyUpOutcome {
        let now = self.clock.now();
        let compiled = Arc::clone(&self.compiled);

        let down_time = self.state.down_times.remove(&event.press_id()).unwrap_or(now);
        let held_for = now.saturating_duration_since(down_time);

        let mut consume = false;
        let mut imitate_down_up = false;
        let mut imitate_up = false;
        let mut successful_long_press = false;
        let mut successful_double_press = false;
        let mut mapped_to_double_press = false;
        let mut short_single_released = false;
        let mut long_single_released = false;
        let mut bounce: Option<(usize, Duration)> = None;

        if let MatchEvent::Key(key_event) = event {
            if let Some(task) = self.state.keys_to_imitate_up.swap_remove(&key_event.key) {
                self.timers.cancel(task);
                consume = true;
                imitate_up = true;
            }
        }

        let satisfied = self.satisfied_triggers();

        for (slot, &location) in compiled.double_press_keys.iter().enumerate() {
            if !satisfied[location.trigger] {
                continue;
            }
            if self.state.triggers[location.trigger].next_index() != location.key {
                continue;
            }
            let key = compiled.key_at(location);
            if !key.matches(event, ClickType::DoublePress) {
                continue;
            }

            mapped_to_double_press = true;
            let trigger = &compiled.triggers[location.trigger].trigger;
            let state = &mut self.state.double_press[slot];

            match state.phase {
                DoublePressPhase::NotPressed => {
                    let timeout = timing::double_press_delay(trigger, &self.settings);
                    state.phase = DoublePressPhase::SinglePressed { deadline: now + timeout };
                    bounce = Some((slot, timeout));
                    if key.consume() {
                        consume = true;
                    }
                }
                DoublePressPhase::SinglePressed { .. } => {
                    successful_double_press = true;
                    state.phase = DoublePressPhase::NotPressed;
                    if let Some(task) = state.bounce_task.take() {
                        self.timers.cancel(task);
                    }
                }
            }
        }

        let mut detected_sequence: SmallVec<[usize; 4]> = SmallVec::new();
        let mut advanced_sequence: SmallVec<[usize; 2]> = SmallVec::new();

        for &t in &compiled.sequence {
            if !satisfied[t] {
                continue;
            }
            let trigger = &compiled.triggers[t].trigger;

            if held_for >= timing::long_press_delay(trigger, &self.settings) {
                successful_long_press = true;
            } else if compiled
                .long_press_sequence_keys
                .iter()
                .any(|key| key.matches(event, ClickType::LongPress))
            {
                imitate_down_up = true;
            }

            let click_type = if successful_long_press {
                ClickType::LongPress
            } else if successful_double_press {
                ClickType::DoublePress
            } else {
                ClickType::ShortPress
            };

            // a sequence containing this one is in progress
            if compiled.sequence_overlaps_sequence[t]
                .iter()
                .any(|&o| self.state.triggers[o].last_matched.is_some())
            {
                continue;
            }

            let state = &mut self.state.triggers[t];
            let next = state.next_index();
            if !trigger.matches_at(next, event, click_type) {
                continue;
            }

            if trigger.keys[next].consume() {
                consume = true;
            }
            state.last_matched = Some(next);
            if let Some(task) = state.sequence_timeout_task.take() {
                self.timers.cancel(task);
            }

            if next == trigger.last_index() {
                let state = &mut self.state.triggers[t];
                state.last_matched = None;
                state.sequence_deadline = None;
                detected_sequence.push(t);
                continue;
            }

            advanced_sequence.push(t);
            let deadline = match self.state.triggers[t].sequence_deadline {
                Some(deadline) if next > 0 => deadline,
                _ => now + timing::sequence_timeout(trigger, &self.settings),
            };
            let task = self.schedule(deadline, Deferred::SequenceTimeout { trigger: t });
            let state = &mut self.state.triggers[t];
            state.sequence_deadline = Some(deadline);
            state.sequence_timeout_task = Some(task);
        }

        let mut released_successful = false;
        for &t in &compiled.parallel {
            let state = &self.state.triggers[t];
            if state.awaiting_release_after_fired {
                released_successful = true;
            }

            let trigger = &compiled.triggers[t].trigger;
            let long_press_delay = timing::long_press_delay(trigger, &self.settings);
            for (k, &awaiting) in state.awaiting_release.iter().enumerate() {
                if awaiting && held_for >= long_press_delay && trigger.matches_at(k, event, ClickType::LongPress) {
                    released_successful = true;
                    successful_long_press = true;
                }
            }
        }

        let mut meta_to_remove = MetaState::empty();

        for &t in &compiled.parallel {
            let compiled_trigger = &compiled.triggers[t];
            let trigger = &compiled_trigger.trigger;
            let single_key = trigger.keys.len() == 1;
            let fired = self.state.triggers[t].awaiting_release_after_fired;
            let mut held_prefix: Option<usize> = None;

            for k in 0..trigger.keys.len() {
                let awaiting = self.state.triggers[t].awaiting_release[k];

                if awaiting && trigger.matches_at(k, event, ClickType::ShortPress) {
                    if single_key {
                        short_single_released = true;
                    }
                    if !fired && !released_successful {
                        imitate_down_up = true;
                    }
                    if compiled.modifier_key_actions {
                        for action in &compiled_trigger.actions {
                            if let Some(meta) = action.data.modifier_meta() {
                                meta_to_remove |= meta;
                            }
                        }
                    }
                    self.state.triggers[t].awaiting_release[k] = false;
                    if trigger.keys[k].consume() {
                        consume = true;
                    }
                }

                if awaiting && trigger.matches_at(k, event, ClickType::LongPress) {
                    self.state.triggers[t].awaiting_release[k] = false;
                    if let Some(task) = self.state.triggers[t].long_press_task.take() {
                        self.timers.cancel(task);
                    }
                    if trigger.keys[k].consume() {
                        consume = true;
                    }
                    if single_key && successful_long_press {
                        long_single_released = true;
                    }

                    let partial = self.state.triggers[t]
                        .last_matched
                        .is_some_and(|m| m < trigger.last_index());
                    if !imitate_down_up
                        && !released_successful
                        && ((single_key && !successful_long_press) || partial)
                    {
                        imitate_down_up = true;
                    }
                }

                if self.state.triggers[t].awaiting_release[k] && held_prefix == k.checked_sub(1) {
                    held_prefix = Some(k);
                }
            }

            let state = &mut self.state.triggers[t];
            if !state.awaiting_release.contains(&true) {
                state.awaiting_release_after_fired = false;
            }
            state.last_matched = held_prefix;

            self.state.meta_from_actions.remove(meta_to_remove);

            if held_prefix != Some(trigger.last_index()) {
                let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
                self.release_parallel(t, meta, now);
            }
        }

        // short presses deferred behind a long press only fire if it failed
        let mut detected_parallel: SmallVec<[usize; 4]> = SmallVec::new();
        let pending: Vec<usize> = self.state.failed_long_press.drain(..).collect();
        if !successful_long_press {
            for t in pending {
                let released = compiled.triggers[t]
                    .keys()
                    .last()
                    .is_some_and(|key| key.matches(event, ClickType::ShortPress));
                if released {
                    detected_parallel.push(t);
                }
            }
        }

        let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
        let mut feedback = Feedback::default();

        for &t in &detected_sequence {
            self.state.claim_replay(t);
            if self.fire_sequence(t, meta, now) {
                feedback.add_fired(&compiled.triggers[t].trigger, &self.settings);
            }
        }
        for &t in &detected_parallel {
            if self.fire_parallel(t, true, meta, now) {
                feedback.add_fired(&compiled.triggers[t].trigger, &self.settings);
            }
        }
        self.emit_feedback(feedback);

        let nothing_fired = detected_sequence.is_empty() && detected_parallel.is_empty();
        let mut replayed = false;

        match bounce {
            Some((slot, timeout)) if nothing_fired && !long_single_released => {
                let state = &mut self.state.double_press[slot];
                if let Some(old) = state.bounce_task.take() {
                    self.timers.cancel(old);
                }
                let task = self.schedule(
                    now + timeout,
                    Deferred::DoublePressBounce {
                        slot,
                        event: event.clone(),
                    },
                );
                self.state.double_press[slot].bounce_task = Some(task);
                replayed = true;
            }
            _ => {
                if (imitate_down_up || imitate_up)
                    && nothing_fired
                    && !short_single_released
                    && !mapped_to_double_press
                {
                    if let MatchEvent::Key(key_event) = event {
                        let input_action = if imitate_up {
                            InputEventAction::Up
                        } else {
                            InputEventAction::DownUp
                        };
                        let imitated = key_event.clone().with_meta_state(meta);
                        self.host.resynthesize(&imitated, input_action);
                        if let Some(task) = self.state.keys_to_imitate_up.swap_remove(&key_event.key) {
                            self.timers.cancel(task);
                        }
                        replayed = true;
                    }
                }
            }
        }

        // hold on to a consumed press until its sequences complete or expire
        if consume && nothing_fired && !replayed && !imitate_up && !released_successful {
            if let MatchEvent::Key(key_event) = event {
                if !advanced_sequence.is_empty() {
                    self.state.sequence_replay.push(ReplayEntry {
                        event: key_event.clone(),
                        owners: advanced_sequence,
                    });
                }
            }
        }

        KeyUpOutcome { consume, replayed }
    }
}
