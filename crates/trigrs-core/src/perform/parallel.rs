// Trigrs Parallel Performer
// Actions of triggers that fire on key-down and know when they are released

use std::time::Duration;

use super::{ActionRunner, PerformContext, PerformerTask};
use crate::action::{Action, InputEventAction, RepeatMode};
use crate::event::MetaState;
use crate::host::Host;
use crate::scheduler::TaskId;
use crate::timing;

#[derive(Debug)]
pub struct ParallelPerformer {
    runner: ActionRunner,
}

impl ParallelPerformer {
    pub(crate) fn new(actions: Vec<Action>) -> Self {
        Self {
            runner: ActionRunner::new(actions),
        }
    }

    /// Run the action list once and (re)start repeat loops.
    ///
    /// The list always runs to completion, even if the trigger is released
    /// while a delay between actions is pending.
    pub(crate) fn on_triggered<H: Host>(
        &mut self,
        ctx: &mut PerformContext<'_, H>,
        called_on_release: bool,
        meta: MetaState,
    ) {
        self.runner.cancel_run(ctx);
        self.run_from(ctx, 0, meta);
        self.runner.restart_repeats(ctx, called_on_release, meta);
    }

    fn run_from<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, cursor: usize, meta: MetaState) {
        let count = self.runner.len();

        for index in cursor..count {
            let action = &self.runner.actions[index];
            let held = &mut self.runner.held[index];

            let mut perform_up = false;
            if action.hold_down
                && action.repeat
                && action.repeat_mode == RepeatMode::TriggerPressedAgain
                && *held
            {
                *held = false;
                perform_up = true;
            }
            if action.stop_hold_down_when_pressed_again && *held {
                *held = false;
                perform_up = true;
            }
            if action.hold_down && !perform_up {
                *held = true;
            }

            let input_action = if perform_up {
                InputEventAction::Up
            } else if action.hold_down {
                InputEventAction::Down
            } else {
                InputEventAction::DownUp
            };
            ctx.perform(action, input_action, meta);

            let mut delay = action.delay_before_next.unwrap_or(Duration::ZERO);
            if action.repeat && action.hold_down {
                delay += timing::hold_down_duration(action, ctx.settings);
            }

            if !delay.is_zero() && index + 1 < count {
                self.runner.schedule_run(ctx, delay, index + 1, meta);
                return;
            }
        }
    }

    /// The trigger was released: stop release-bound repeats and lift
    /// release-bound holds.
    pub(crate) fn on_released<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, meta: MetaState) {
        for index in 0..self.runner.len() {
            if self.runner.actions[index].repeat_mode == RepeatMode::TriggerReleased {
                self.runner.stop_repeat(ctx, index);
            }
        }

        for index in 0..self.runner.len() {
            let action = &self.runner.actions[index];
            if action.hold_down
                && !action.stop_hold_down_when_pressed_again
                && self.runner.held[index]
            {
                self.runner.held[index] = false;
                ctx.perform(action, InputEventAction::Up, meta);
            }
        }
    }

    pub(crate) fn run_task<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>, id: TaskId, task: PerformerTask) {
        match task {
            PerformerTask::Run { cursor } => match self.runner.take_run(id) {
                Some(meta) => self.run_from(ctx, cursor, meta),
                None => log::trace!("Discarding stale action run for trigger {}", ctx.trigger),
            },
            PerformerTask::Repeat { action } => self.runner.run_repeat(ctx, id, action),
            PerformerTask::HoldRelease { .. } => {
                log::trace!("Parallel trigger {} has no timed holds", ctx.trigger)
            }
        }
    }

    pub(crate) fn reset<H: Host>(&mut self, ctx: &mut PerformContext<'_, H>) {
        self.runner.reset(ctx);
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.runner.is_idle()
    }
}
