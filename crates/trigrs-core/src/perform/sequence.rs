// Trigrs Sequence Performer
// Actions of triggers resolved on key-up, which have no release to wait for

use std::time::Duration;

use super::{ActionRunner, PerformContext, PerformerTask};
use crate::action::{Action, InputEventAction};
use crate::event::MetaState;
use crate::host::Host;
use crate::scheduler::TaskId;
use crate::timing;

#[derive(Debug, Clone, Copy)]
struct TimedHold {
    task: TaskId,
    meta: MetaState,
}

#[derive(Debug)]
pub struct SequencePerformer {
    runner: ActionRunner,
    /// Pending release of each timed hold-down
    releases: Vec<Option<TimedHold>>,
}

impl SequencePerformer {
    pub(crate) fn new(actions: Vec<Action>) -> Self {
        let count = actions.len();
        Self {
            runner: ActionRunner::new(actions),
            releases: vec![None; count],
        }
    }

    /// Run the action list once. Hold-downs are released after their hold
    /// duration, or by the next firing when they stop on a second press.
    pub(crate) fn on_triggered<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, meta: MetaState) {
        self.runner.cancel_run(ctx);
        self.run_from(ctx, 0, meta);
        self.runner.restart_repeats(ctx, true, meta);
    }

    fn run_from<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, cursor: usize, meta: MetaState) {
        let count = self.runner.len();

        for index in cursor..count {
            let action = &self.runner.actions[index];

            if action.stop_hold_down_when_pressed_again && self.runner.held[index] {
                self.runner.held[index] = false;
                ctx.perform(action, InputEventAction::Up, meta);
            } else if action.hold_down {
                if let Some(pending) = self.releases[index].take() {
                    ctx.timers.cancel(pending.task);
                    ctx.perform(action, InputEventAction::Up, pending.meta);
                }

                ctx.perform(action, InputEventAction::Down, meta);
                self.runner.held[index] = true;

                if !action.stop_hold_down_when_pressed_again {
                    let hold = timing::hold_down_duration(action, ctx.settings);
                    let task = ctx.schedule(hold, PerformerTask::HoldRelease { action: index });
                    self.releases[index] = Some(TimedHold { task, meta });
                }
            } else {
                ctx.perform(action, InputEventAction::DownUp, meta);
            }

            let delay = action.delay_before_next.unwrap_or(Duration::ZERO);
            if !delay.is_zero() && index + 1 < count {
                self.runner.schedule_run(ctx, delay, index + 1, meta);
                return;
            }
        }
    }

    fn release_hold<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, id: TaskId, index: usize) {
        match self.releases.get(index).copied().flatten() {
            Some(hold) if hold.task == id => {
                self.releases[index] = None;
                if self.runner.held[index] {
                    self.runner.held[index] = false;
                    ctx.perform(&self.runner.actions[index], InputEventAction::Up, hold.meta);
                }
            }
            _ => log::trace!("Discarding stale hold release for action {}", index),
        }
    }

    pub(crate) fn run_task<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, id: TaskId, task: PerformerTask) {
        match task {
            PerformerTask::Run { cursor } => match self.runner.take_run(id) {
                Some(meta) => self.run_from(ctx, cursor, meta),
                None => log::trace!("Discarding stale action run for trigger {}", ctx.trigger),
            },
            PerformerTask::Repeat { action } => self.runner.run_repeat(ctx, id, action),
            PerformerTask::HoldRelease { action } => self.release_hold(ctx, id, action),
        }
    }

    pub(crate) fn reset<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>) {
        for slot in self.releases.iter_mut() {
            if let Some(hold) = slot.take() {
                ctx.timers.cancel(hold.task);
            }
        }
        self.runner.reset(ctx);
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.runner.is_idle() && self.releases.iter().all(Option::is_none)
    }
}
