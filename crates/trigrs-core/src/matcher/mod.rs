// Trigrs Trigger Matcher
// Turns raw input into trigger firings and consume decisions

pub(crate) mod deferred;
mod key_down;
mod key_up;
pub(crate) mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::action::InputEventAction;
use crate::compiler::CompiledTriggerSet;
use crate::event::{
    AssistantType, DpadTracker, FingerprintGesture, GamePadEvent, InputEvent, KeyAction, KeyEvent,
    MatchEvent, MetaState,
};
use crate::host::Host;
use crate::keymap::KeyMap;
use crate::perform::{PerformContext, Performer};
use crate::scheduler::{TaskId, TimerQueue};
use crate::settings::Settings;
use crate::timing::{self, Clock, ManualClock, SystemClock};
use crate::trigger::Trigger;

use deferred::{Deferred, Scheduled};
use state::MatcherState;

/// Vibration and toast requests gathered while handling one event.
#[derive(Debug, Default)]
pub(crate) struct Feedback {
    /// One entry per fired trigger; `None` when it does not vibrate
    vibrations: SmallVec<[Option<Duration>; 4]>,
    toast: bool,
}

impl Feedback {
    fn add_fired(&mut self, trigger: &Trigger, settings: &Settings) {
        self.toast |= trigger.show_toast;
        self.vibrations
            .push(trigger.vibrate.then(|| timing::vibrate_duration(trigger, settings)));
    }

    fn request_vibration(&mut self, duration: Duration) {
        self.vibrations.push(Some(duration));
    }
}

/// How a key-up was handled
#[derive(Debug, Clone, Copy, Default)]
struct KeyUpOutcome {
    consume: bool,
    /// The press was replayed, or will be once a double press times out
    replayed: bool,
}

/// The trigger detection engine.
///
/// Feed it every input event with [`on_input_event`](Self::on_input_event)
/// and it answers whether the event should be suppressed. Timed behavior
/// (long presses, sequence timeouts, repeats) runs from
/// [`on_tick`](Self::on_tick), which must be called at
/// [`next_deadline`](Self::next_deadline). Every input call runs due work
/// first.
pub struct TriggerEngine<H: Host, C: Clock = SystemClock> {
    host: H,
    clock: C,
    settings: Settings,
    compiled: Arc<CompiledTriggerSet>,
    state: MatcherState,
    performers: Vec<Performer>,
    timers: TimerQueue<Scheduled>,
    dpad: DpadTracker,
    /// Bumped on every reload and reset to orphan older tasks
    generation: u64,
}

impl<H: Host> TriggerEngine<H, SystemClock> {
    pub fn new(host: H) -> Self {
        Self::with_clock(host, SystemClock)
    }
}

impl<H: Host, C: Clock> TriggerEngine<H, C> {
    pub fn with_clock(host: H, clock: C) -> Self {
        Self {
            host,
            clock,
            settings: Settings::default(),
            compiled: Arc::new(CompiledTriggerSet::empty()),
            state: MatcherState::default(),
            performers: Vec::new(),
            timers: TimerQueue::new(),
            dpad: DpadTracker::new(),
            generation: 0,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Compile `key_maps` and replace the active set. Anything in flight
    /// for the old set is released first.
    pub fn load_key_maps(&mut self, key_maps: &[KeyMap]) {
        self.load_compiled(CompiledTriggerSet::compile(key_maps));
    }

    pub fn load_compiled(&mut self, compiled: CompiledTriggerSet) {
        self.reset();

        self.performers = compiled
            .triggers
            .iter()
            .map(|t| Performer::new(t.actions.clone(), t.fires_on_key_down))
            .collect();
        self.state = MatcherState::new(&compiled);
        self.compiled = Arc::new(compiled);

        log::info!("Loaded {} triggers", self.compiled.len());
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn compiled(&self) -> &CompiledTriggerSet {
        &self.compiled
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Handle any input event. Returns whether it must be suppressed.
    pub fn on_input_event(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::Key(key_event) => self.on_key_event(key_event),
            InputEvent::Assistant(kind) => self.on_assistant_event(*kind),
            InputEvent::Fingerprint(gesture) => self.on_fingerprint_gesture(*gesture),
            InputEvent::FloatingButton { uid, action } => match action {
                KeyAction::Down => self.on_floating_button_down(uid),
                KeyAction::Up => self.on_floating_button_up(uid),
            },
        }
    }

    pub fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.on_tick();

        if self.compiled.is_empty() {
            return false;
        }

        if self.dpad.on_key_event(event) {
            log::trace!("{} already held through DPAD motion", event.key);
            return true;
        }

        let external = event.device.is_external;
        if (external && !self.compiled.detect_external) || (!external && !self.compiled.detect_internal) {
            return false;
        }

        self.on_event_post_filter(MatchEvent::Key(event.clone()), event.action)
    }

    /// Handle controller motion. DPAD hat changes are matched as key events.
    pub fn on_motion_event(&mut self, event: &GamePadEvent) -> bool {
        self.on_tick();

        if self.compiled.is_empty() {
            return false;
        }

        let external = event.device.is_external;
        if (external && !self.compiled.detect_external) || (!external && !self.compiled.detect_internal) {
            return false;
        }

        let mut consume = false;
        for key_event in self.dpad.convert_motion_event(event) {
            let action = key_event.action;
            if self.on_event_post_filter(MatchEvent::Key(key_event), action) {
                consume = true;
            }
        }
        consume
    }

    /// An assistant invocation is a complete press and release.
    pub fn on_assistant_event(&mut self, kind: AssistantType) -> bool {
        self.on_press_and_release(MatchEvent::Assistant(kind))
    }

    /// A fingerprint gesture is a complete press and release.
    pub fn on_fingerprint_gesture(&mut self, gesture: FingerprintGesture) -> bool {
        self.on_press_and_release(MatchEvent::Fingerprint(gesture))
    }

    /// A tap on a floating button, for hosts that only report clicks.
    pub fn on_floating_button_press(&mut self, uid: &str) -> bool {
        self.on_press_and_release(MatchEvent::FloatingButton(uid.to_string()))
    }

    /// Floating buttons that report touch down and up separately can be
    /// long pressed.
    pub fn on_floating_button_down(&mut self, uid: &str) -> bool {
        self.on_tick();
        if self.compiled.is_empty() {
            return false;
        }
        self.on_event_post_filter(MatchEvent::FloatingButton(uid.to_string()), KeyAction::Down)
    }

    pub fn on_floating_button_up(&mut self, uid: &str) -> bool {
        self.on_tick();
        if self.compiled.is_empty() {
            return false;
        }
        self.on_event_post_filter(MatchEvent::FloatingButton(uid.to_string()), KeyAction::Up)
    }

    fn on_press_and_release(&mut self, event: MatchEvent) -> bool {
        self.on_tick();
        if self.compiled.is_empty() {
            return false;
        }
        let down = self.on_event_post_filter(event.clone(), KeyAction::Down);
        let up = self.on_event_post_filter(event, KeyAction::Up);
        down || up
    }

    fn on_event_post_filter(&mut self, event: MatchEvent, action: KeyAction) -> bool {
        if let MatchEvent::Key(key_event) = &event {
            self.state.meta_from_key_event = key_event.meta_state;
        }

        // modifiers held as part of a trigger must not leak into other keys
        for location in &self.compiled.modifier_keys {
            if !self.state.triggers[location.trigger].awaiting_release[location.key] {
                continue;
            }
            if let Some(key) = self.compiled.key_at(*location).key_code() {
                self.state
                    .meta_from_key_event
                    .remove(MetaState::from_modifier(key));
            }
        }

        let press = event.press_id();
        match action {
            KeyAction::Down => {
                let consume = self.on_key_down(&event);
                let repeat = event.key_event().is_some_and(|e| e.repeat_count > 0);
                if consume {
                    self.state.consumed_downs.insert(press);
                } else if !repeat {
                    self.state.consumed_downs.remove(&press);
                }
                consume
            }
            KeyAction::Up => {
                let outcome = self.on_key_up(&event);
                let down_consumed = self.state.consumed_downs.remove(&press);
                if outcome.consume || outcome.replayed || !down_consumed {
                    return outcome.consume;
                }

                // the down was swallowed, so the up cannot pass through alone
                let MatchEvent::Key(key_event) = &event else {
                    return false;
                };
                log::debug!("Replaying unclaimed press of {}", key_event.key);
                let replay = key_event
                    .clone()
                    .with_meta_state(self.state.meta_from_key_event | self.state.meta_from_actions);
                self.host.resynthesize(&replay, InputEventAction::DownUp);
                true
            }
        }
    }

    /// Run every task that has fallen due.
    pub fn on_tick(&mut self) {
        let now = self.clock.now();
        while let Some((id, scheduled)) = self.timers.pop_due(now) {
            if scheduled.generation != self.generation {
                log::trace!("Dropping task from generation {}", scheduled.generation);
                continue;
            }
            self.run_deferred(id, scheduled.deferred, now);
        }
    }

    /// When [`on_tick`](Self::on_tick) next has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Number of scheduled tasks
    pub fn pending_tasks(&self) -> usize {
        self.timers.len()
    }

    /// Drop all matching progress, stop every performer and release
    /// everything held down.
    pub fn reset(&mut self) {
        let now = self.clock.now();
        for (trigger, performer) in self.performers.iter_mut().enumerate() {
            let mut ctx = PerformContext {
                host: &mut self.host,
                timers: &mut self.timers,
                settings: &self.settings,
                now,
                trigger,
                generation: self.generation,
            };
            performer.reset(&mut ctx);
        }

        self.timers.clear();
        self.state = MatcherState::new(&self.compiled);
        self.dpad.reset();
        self.generation += 1;
    }

    fn schedule(&mut self, at: Instant, deferred: Deferred) -> TaskId {
        self.timers.schedule(
            at,
            Scheduled {
                generation: self.generation,
                deferred,
            },
        )
    }

    fn perform_context(&mut self, trigger: usize, now: Instant) -> Option<(&mut Performer, PerformContext<'_, H>)> {
        let performer = self.performers.get_mut(trigger)?;
        let ctx = PerformContext {
            host: &mut self.host,
            timers: &mut self.timers,
            settings: &self.settings,
            now,
            trigger,
            generation: self.generation,
        };
        Some((performer, ctx))
    }

    /// Per-trigger constraint results for the current host state
    fn satisfied_triggers(&self) -> Vec<bool> {
        if !self.compiled.has_constraints {
            return vec![true; self.compiled.len()];
        }
        let snapshot = self.host.constraint_snapshot();
        self.compiled
            .triggers
            .iter()
            .map(|t| snapshot.is_satisfied(&t.constraints))
            .collect()
    }

    fn actions_blocked(&self, trigger: usize) -> bool {
        let compiled = &self.compiled.triggers[trigger];
        for action in &compiled.actions {
            if let Some(err) = self.host.action_error(&action.data) {
                log::debug!("Not firing {}: {}", compiled.uid, err);
                return true;
            }
        }
        false
    }

    /// Run a parallel trigger's actions. Returns whether it fired.
    fn fire_parallel(&mut self, trigger: usize, called_on_release: bool, meta: MetaState, now: Instant) -> bool {
        if self.actions_blocked(trigger) {
            return false;
        }
        log::debug!("Fired {}", self.compiled.triggers[trigger].uid);

        match self.perform_context(trigger, now) {
            Some((Performer::Parallel(performer), mut ctx)) => {
                performer.on_triggered(&mut ctx, called_on_release, meta);
                true
            }
            _ => false,
        }
    }

    fn fire_sequence(&mut self, trigger: usize, meta: MetaState, now: Instant) -> bool {
        if self.actions_blocked(trigger) {
            return false;
        }
        log::debug!("Fired {}", self.compiled.triggers[trigger].uid);

        match self.perform_context(trigger, now) {
            Some((Performer::Sequence(performer), mut ctx)) => {
                performer.on_triggered(&mut ctx, meta);
                true
            }
            _ => false,
        }
    }

    fn release_parallel(&mut self, trigger: usize, meta: MetaState, now: Instant) {
        if let Some((Performer::Parallel(performer), mut ctx)) = self.perform_context(trigger, now) {
            performer.on_released(&mut ctx, meta);
        }
    }

    fn emit_feedback(&mut self, feedback: Feedback) {
        if !feedback.vibrations.is_empty() {
            if self.settings.force_vibrate {
                self.host.vibrate(self.settings.vibrate_duration);
            } else if let Some(longest) = feedback.vibrations.iter().flatten().max() {
                self.host.vibrate(*longest);
            }
        }
        if feedback.toast {
            self.host.show_triggered_toast();
        }
    }

    /// Feedback for a trigger fired from a timed task
    fn deferred_feedback(&mut self, trigger: usize) {
        let trigger = &self.compiled.triggers[trigger].trigger;
        if trigger.vibrate || self.settings.force_vibrate || trigger.long_press_double_vibration {
            self.host
                .vibrate(timing::vibrate_duration(trigger, &self.settings));
        }
        if trigger.show_toast {
            self.host.show_triggered_toast();
        }
    }

    /// Replay the presses no sequence trigger can claim after `trigger`
    /// timed out.
    fn expire_sequence(&mut self, trigger: usize) {
        for event in self.state.release_replay_owner(trigger) {
            log::debug!("Sequence {} timed out, replaying {}", self.compiled.triggers[trigger].uid, event.key);
            self.host.resynthesize(&event, InputEventAction::DownUp);
        }
    }
}

impl<H: Host> TriggerEngine<H, ManualClock> {
    /// Move the manual clock forward, running each task at its own deadline.
    pub fn advance_by(&mut self, by: Duration) {
        let target = self.clock.now() + by;
        while let Some(deadline) = self.timers.next_deadline() {
            if deadline > target {
                break;
            }
            self.clock.set(deadline);
            self.on_tick();
        }
        self.clock.set(target);
        self.on_tick();
    }
}

impl<H: Host, C: Clock> Drop for TriggerEngine<H, C> {
    fn drop(&mut self) {
        if self.performers.iter().any(|p| !p.is_idle()) {
            log::debug!("Releasing held actions on shutdown");
            self.reset();
        }
    }
}
