// Trigrs Key Down
// Advance triggers on a press and fire parallel triggers completed by it

use std::sync::Arc;
use std::time::Duration;

use smallvec::SmallVec;

use super::deferred::{Deferred, IMITATE_REPEAT_DELAY};
use super::state::DoublePressPhase;
use super::{Feedback, TriggerEngine};
use crate::action::InputEventAction;
use crate::event::MatchEvent;
use crate::host::Host;
use crate::timing::{self, Clock};
use crate::trigger::ClickType;

impl<H: Host, C: Clock> TriggerEngine<H, C> {
    pub(super) fn on_key_down(&mut self, event: &MatchEvent) -> bool {
        let now = self.clock.now();
        let compiled = Arc::clone(&self.compiled);

        if let MatchEvent::Key(key_event) = event {
            if key_event.repeat_count > 0
                && compiled
                    .repeated_down_keys
                    .iter()
                    .any(|key| key.matches_any_click(event))
            {
                return true;
            }
        }

        let press = event.press_id();
        let repeat = event.key_event().is_some_and(|e| e.repeat_count > 0);

        // a repeat of a press already seen keeps that press's decision
        if repeat && self.state.down_times.contains_key(&press) {
            log::trace!("Repeated down of a tracked press");
            return self.state.consumed_downs.contains(&press);
        }

        match event.key_event() {
            Some(key_event) if key_event.repeat_count > 0 => {
                self.state.down_times.entry(press).or_insert(now);
            }
            _ => {
                self.state.down_times.insert(press, now);
            }
        }

        let satisfied = self.satisfied_triggers();
        let mut consume = false;

        for &t in &compiled.sequence {
            if !satisfied[t] {
                continue;
            }
            let state = &mut self.state.triggers[t];
            if state.sequence_deadline.is_some_and(|deadline| now >= deadline) {
                state.last_matched = None;
                state.sequence_deadline = None;
                if let Some(task) = state.sequence_timeout_task.take() {
                    self.timers.cancel(task);
                }
                self.expire_sequence(t);
            } else if compiled.triggers[t]
                .keys()
                .iter()
                .any(|key| key.same_source(event) && key.consume())
            {
                consume = true;
            }
        }

        for (slot, &location) in compiled.double_press_keys.iter().enumerate() {
            let pending = match self.state.double_press[slot].phase {
                DoublePressPhase::SinglePressed { deadline } => now < deadline,
                DoublePressPhase::NotPressed => false,
            };
            if !pending {
                self.state.double_press[slot].phase = DoublePressPhase::NotPressed;
                continue;
            }

            let key = compiled.key_at(location);
            if satisfied[location.trigger] && key.consume() && key.matches(event, ClickType::DoublePress) {
                consume = true;
            }
        }

        for &t in &compiled.parallel {
            if !satisfied[t] || self.actions_blocked(t) {
                continue;
            }
            let trigger = &compiled.triggers[t].trigger;
            let state = &mut self.state.triggers[t];
            let next = state.next_index();

            if trigger.matches_at(next, event, ClickType::ShortPress)
                || trigger.matches_at(next, event, ClickType::LongPress)
            {
                state.last_matched = Some(next);
                state.awaiting_release[next] = true;
            }
        }

        let mut mapped_to_parallel = false;
        let mut awaiting_long_press = false;
        let mut detected_short: SmallVec<[usize; 4]> = SmallVec::new();
        let mut feedback = Feedback::default();

        for &t in &compiled.parallel {
            if !satisfied[t] {
                continue;
            }

            // a longer trigger containing this one has completed
            let overlapped = compiled.sequence_overlaps_parallel[t]
                .iter()
                .chain(&compiled.parallel_overlaps_parallel[t])
                .any(|&o| self.state.triggers[o].last_matched == Some(compiled.triggers[o].last_index()));
            if overlapped {
                continue;
            }

            let Some(last) = self.state.triggers[t].last_matched else {
                continue;
            };
            let trigger = &compiled.triggers[t].trigger;
            let is_last = last == trigger.last_index();

            if trigger.matches_at(last, event, ClickType::ShortPress) {
                if trigger.keys[last].consume() {
                    consume = true;
                }

                if is_last {
                    mapped_to_parallel = true;
                    self.state.triggers[t].awaiting_release_after_fired = true;

                    match self.overlapping_sequence(t, event) {
                        None => {
                            for action in &compiled.triggers[t].actions {
                                if let Some(meta) = action.data.modifier_meta() {
                                    self.state.meta_from_actions |= meta;
                                }
                            }
                            detected_short.push(t);
                        }
                        Some((sequence, timeout)) => {
                            log::debug!(
                                "{} waits for sequence {}",
                                compiled.triggers[t].uid,
                                compiled.triggers[sequence].uid
                            );
                            if let Some(old) = self.state.triggers[t].after_sequence_task.take() {
                                self.timers.cancel(old);
                            }
                            let task = self.schedule(
                                now + timeout,
                                Deferred::AfterSequenceTimeout { trigger: t, sequence },
                            );
                            self.state.triggers[t].after_sequence_task = Some(task);
                        }
                    }
                }
            }

            if trigger.matches_at(last, event, ClickType::LongPress) {
                if trigger.keys[last].consume() {
                    consume = true;
                }

                if is_last {
                    awaiting_long_press = true;

                    if trigger.vibrate && trigger.long_press_double_vibration {
                        feedback.request_vibration(timing::vibrate_duration(trigger, &self.settings));
                    }

                    if let Some(old) = self.state.triggers[t].long_press_task.take() {
                        self.timers.cancel(old);
                    }
                    let delay = timing::long_press_delay(trigger, &self.settings);
                    let task = self.schedule(now + delay, Deferred::LongPress { trigger: t });
                    self.state.triggers[t].long_press_task = Some(task);
                }
            }
        }

        let is_modifier_key = event.key_event().is_some_and(|e| e.key.is_modifier());
        if compiled.modifier_key_actions
            && !is_modifier_key
            && !self.state.meta_from_actions.is_empty()
            && !mapped_to_parallel
        {
            if let MatchEvent::Key(key_event) = event {
                consume = true;

                let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
                let imitated = key_event.clone().with_meta_state(meta);
                self.host.resynthesize(&imitated, InputEventAction::Down);

                let task = self.schedule(
                    now + IMITATE_REPEAT_DELAY,
                    Deferred::ImitateRepeat {
                        event: key_event.clone(),
                    },
                );
                if let Some(old) = self.state.keys_to_imitate_up.insert(key_event.key, task) {
                    self.timers.cancel(old);
                }
            }
        }

        if !detected_short.is_empty() {
            let double_press_pending = compiled.double_press_keys.iter().any(|location| {
                satisfied[location.trigger] && compiled.key_at(*location).matches(event, ClickType::DoublePress)
            });

            if double_press_pending {
                self.state.failed_double_press.extend(detected_short.iter().copied());
            } else if awaiting_long_press {
                self.state.failed_long_press.extend(detected_short.iter().copied());
            } else {
                let meta = self.state.meta_from_key_event | self.state.meta_from_actions;
                for &t in &detected_short {
                    if self.fire_parallel(t, false, meta, now) {
                        feedback.add_fired(&compiled.triggers[t].trigger, &self.settings);
                    }
                }
            }
        }

        self.emit_feedback(feedback);

        if consume {
            return true;
        }

        compiled.sequence.iter().any(|&t| {
            satisfied[t]
                && compiled.triggers[t]
                    .keys()
                    .iter()
                    .any(|key| key.matches_any_click(event) && key.consume())
        })
    }

    /// The sequence trigger a completed parallel trigger has to wait for:
    /// the one with the longest timeout whose remaining keys could still
    /// follow `event`.
    fn overlapping_sequence(&self, trigger: usize, event: &MatchEvent) -> Option<(usize, Duration)> {
        let mut chosen: Option<(usize, Duration)> = None;

        for &sequence in &self.compiled.sequence_overlaps_parallel[trigger] {
            let next = self.state.triggers[sequence].next_index();
            let sequence_trigger = &self.compiled.triggers[sequence].trigger;
            let reachable = (0..=next).any(|i| sequence_trigger.matches_at(i, event, ClickType::ShortPress));
            if !reachable {
                continue;
            }

            let timeout = timing::sequence_timeout(sequence_trigger, &self.settings);
            if chosen.map_or(true, |(_, longest)| timeout > longest) {
                chosen = Some((sequence, timeout));
            }
        }

        chosen
    }
}
