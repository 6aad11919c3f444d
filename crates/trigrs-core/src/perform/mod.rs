// Trigrs Action Performers
// Run a trigger's action list with multiplier, repeat and hold-down

pub mod parallel;
pub mod sequence;

use std::time::{Duration, Instant};

use crate::action::{Action, InputEventAction, RepeatMode};
use crate::event::MetaState;
use crate::host::Host;
use crate::matcher::deferred::{Deferred, Scheduled};
use crate::scheduler::{TaskId, TimerQueue};
use crate::settings::Settings;
use crate::timing;

pub use parallel::ParallelPerformer;
pub use sequence::SequencePerformer;

/// Deferred work owned by a performer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PerformerTask {
    /// Continue the action list at `cursor`
    Run { cursor: usize },
    /// Next iteration of a repeat loop
    Repeat { action: usize },
    /// End of a timed hold-down
    HoldRelease { action: usize },
}

/// What a performer may touch while running.
pub(crate) struct PerformContext<'a, H: Host> {
    pub host: &'a mut H,
    pub timers: &'a mut TimerQueue<Scheduled>,
    pub settings: &'a Settings,
    pub now: Instant,
    pub trigger: usize,
    pub generation: u64,
}

impl<H: Host> PerformContext<'_, H> {
    fn schedule(&mut self, delay: Duration, task: PerformerTask) -> TaskId {
        self.timers.schedule(
            self.now + delay,
            Scheduled {
                generation: self.generation,
                deferred: Deferred::Perform {
                    trigger: self.trigger,
                    task,
                },
            },
        )
    }

    fn cancel(&mut self, id: TaskId) {
        self.timers.cancel(id);
    }

    /// Perform one phase of an action as many times as its multiplier says
    fn perform(&mut self, action: &Action, input_action: InputEventAction, meta_state: MetaState) {
        for _ in 0..action.times() {
            self.host.perform(&action.data, input_action, meta_state);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RepeatSlot {
    task: TaskId,
    count: u32,
    meta: MetaState,
    /// A hold-down repeat has sent its down but not its up
    holding: bool,
}

#[derive(Debug, Clone, Copy)]
struct RunJob {
    task: TaskId,
    meta: MetaState,
}

/// Per-action bookkeeping shared by both performer variants.
#[derive(Debug)]
struct ActionRunner {
    actions: Vec<Action>,
    held: Vec<bool>,
    repeats: Vec<Option<RepeatSlot>>,
    run: Option<RunJob>,
}

impl ActionRunner {
    fn new(actions: Vec<Action>) -> Self {
        let count = actions.len();
        Self {
            actions,
            held: vec![false; count],
            repeats: vec![None; count],
            run: None,
        }
    }

    fn len(&self) -> usize {
        self.actions.len()
    }

    fn cancel_run<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>) {
        if let Some(run) = self.run.take() {
            ctx.cancel(run.task);
        }
    }

    /// Take the pending run job if `id` is still the current one
    fn take_run(&mut self, id: TaskId) -> Option<MetaState> {
        match self.run {
            Some(run) if run.task == id => {
                self.run = None;
                Some(run.meta)
            }
            _ => None,
        }
    }

    fn schedule_run<H: Host>(
        &mut self,
        ctx: &mut PerformContext<'_, H>,
        delay: Duration,
        cursor: usize,
        meta: MetaState,
    ) {
        let task = ctx.schedule(delay, PerformerTask::Run { cursor });
        self.run = Some(RunJob { task, meta });
    }

    /// Stop the repeat loop of one action, releasing it if mid-hold
    fn stop_repeat<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, index: usize) -> bool {
        let Some(slot) = self.repeats[index].take() else {
            return false;
        };
        ctx.cancel(slot.task);
        if slot.holding {
            ctx.perform(&self.actions[index], InputEventAction::Up, slot.meta);
        }
        true
    }

    /// Cancel every repeat loop and start the ones this firing asks for.
    fn restart_repeats<H: Host>(
        &mut self,
        ctx: &mut PerformContext<'_, H>,
        called_on_release: bool,
        meta: MetaState,
    ) {
        for index in 0..self.len() {
            let was_repeating = self.stop_repeat(ctx, index);
            let action = &self.actions[index];

            if !action.repeat {
                continue;
            }
            if called_on_release && action.repeat_mode == RepeatMode::TriggerReleased {
                continue;
            }
            // pressing again toggles the loop off
            if action.repeat_mode == RepeatMode::TriggerPressedAgain && was_repeating {
                continue;
            }
            if action.data.is_modifier_key() {
                continue;
            }

            let delay = timing::repeat_delay(action, ctx.settings);
            let task = ctx.schedule(delay, PerformerTask::Repeat { action: index });
            self.repeats[index] = Some(RepeatSlot {
                task,
                count: 0,
                meta,
                holding: false,
            });
        }
    }

    fn run_repeat<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, id: TaskId, index: usize) {
        let Some(mut slot) = self.repeats.get(index).copied().flatten() else {
            log::trace!("Discarding repeat of finished loop for action {}", index);
            return;
        };
        if slot.task != id {
            log::trace!("Discarding stale repeat for action {}", index);
            return;
        }

        let action = &self.actions[index];
        let next_delay = if slot.holding {
            ctx.perform(action, InputEventAction::Up, slot.meta);
            slot.holding = false;
            slot.count += 1;
            timing::repeat_rate(action, ctx.settings)
        } else if action.hold_down {
            ctx.perform(action, InputEventAction::Down, slot.meta);
            slot.holding = true;
            timing::hold_down_duration(action, ctx.settings)
        } else {
            ctx.perform(action, InputEventAction::DownUp, slot.meta);
            slot.count += 1;
            timing::repeat_rate(action, ctx.settings)
        };

        if !slot.holding && action.repeat_limit_reached(slot.count) {
            self.repeats[index] = None;
            return;
        }

        slot.task = ctx.schedule(next_delay, PerformerTask::Repeat { action: index });
        self.repeats[index] = Some(slot);
    }

    /// Cancel all work and release everything held down
    fn reset<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>) {
        self.cancel_run(ctx);

        for index in 0..self.len() {
            let repeat_holding = self.repeats[index].is_some_and(|slot| slot.holding);
            if let Some(slot) = self.repeats[index].take() {
                ctx.cancel(slot.task);
            }
            if self.held[index] || repeat_holding {
                ctx.perform(&self.actions[index], InputEventAction::Up, MetaState::empty());
            }
            self.held[index] = false;
        }
    }

    fn is_idle(&self) -> bool {
        self.run.is_none() && self.repeats.iter().all(Option::is_none) && !self.held.contains(&true)
    }
}

/// The performer bound to one compiled trigger
#[derive(Debug)]
pub(crate) enum Performer {
    Parallel(ParallelPerformer),
    Sequence(SequencePerformer),
}

impl Performer {
    pub fn new(actions: Vec<Action>, fires_on_key_down: bool) -> Self {
        if fires_on_key_down {
            Performer::Parallel(ParallelPerformer::new(actions))
        } else {
            Performer::Sequence(SequencePerformer::new(actions))
        }
    }

    pub fn run_task<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, id: TaskId, task: PerformerTask) {
        match self {
            Performer::Parallel(p) => p.run_task(ctx, id, task),
            Performer::Sequence(s) => s.run_task(ctx, id, task),
        }
    }

    pub fn reset<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>) {
        match self {
            Performer::Parallel(p) => p.reset(ctx),
            Performer::Sequence(s) => s.reset(ctx),
        }
    }

    pub fn is_idle(&self) -> bool {
        match self {
            Performer::Parallel(p) => p.is_idle(),
            Performer::Sequence(s) => s.is_idle(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::action::ActionData;
    use crate::event::KeyEvent;

    /// Records every performed action phase
    #[derive(Debug, Default)]
    pub struct LogHost {
        pub performed: Vec<(ActionData, InputEventAction)>,
    }

    impl Host for LogHost {
        fn perform(&mut self, action: &ActionData, input_action: InputEventAction, _meta: MetaState) {
            self.performed.push((action.clone(), input_action));
        }

        fn resynthesize(&mut self, _event: &KeyEvent, _input_action: InputEventAction) {}
    }

    /// Drives one performer against a fake clock
    pub struct Harness {
        pub host: LogHost,
        pub timers: TimerQueue<Scheduled>,
        pub settings: Settings,
        pub now: Instant,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                host: LogHost::default(),
                timers: TimerQueue::new(),
                settings: Settings::default(),
                now: Instant::now(),
            }
        }

        pub fn ctx(&mut self) -> PerformContext<'_, LogHost> {
            PerformContext {
                host: &mut self.host,
                timers: &mut self.timers,
                settings: &self.settings,
                now: self.now,
                trigger: 0,
                generation: 0,
            }
        }

        /// Advance time, running every task that falls due
        pub fn advance(&mut self, performer: &mut Performer, by: Duration) {
            let target = self.now + by;
            while let Some(deadline) = self.timers.next_deadline() {
                if deadline > target {
                    break;
                }
                self.now = deadline;
                let Some((id, scheduled)) = self.timers.pop_due(deadline) else {
                    break;
                };
                if let Deferred::Perform { task, .. } = scheduled.deferred {
                    let mut ctx = self.ctx();
                    performer.run_task(&mut ctx, id, task);
                }
            }
            self.now = target;
        }

        pub fn take(&mut self) -> Vec<(ActionData, InputEventAction)> {
            std::mem::take(&mut self.host.performed)
        }
    }
}
