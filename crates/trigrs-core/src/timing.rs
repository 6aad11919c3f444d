// Trigrs Timing
// Monotonic clocks and delay resolution

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::action::Action;
use crate::settings::Settings;
use crate::trigger::Trigger;

/// Source of monotonic time for the engine.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The real monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the engine
/// owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Move to `to`. Never moves backwards.
    pub fn set(&self, to: Instant) {
        let mut now = self.now.lock();
        if to > *now {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

pub fn long_press_delay(trigger: &Trigger, settings: &Settings) -> Duration {
    trigger.long_press_delay.unwrap_or(settings.long_press_delay)
}

pub fn double_press_delay(trigger: &Trigger, settings: &Settings) -> Duration {
    trigger.double_press_delay.unwrap_or(settings.double_press_delay)
}

pub fn sequence_timeout(trigger: &Trigger, settings: &Settings) -> Duration {
    trigger.sequence_timeout.unwrap_or(settings.sequence_trigger_timeout)
}

pub fn vibrate_duration(trigger: &Trigger, settings: &Settings) -> Duration {
    trigger.vibrate_duration.unwrap_or(settings.vibrate_duration)
}

pub fn hold_down_duration(action: &Action, settings: &Settings) -> Duration {
    action.hold_down_duration.unwrap_or(settings.hold_down_duration)
}

pub fn repeat_delay(action: &Action, settings: &Settings) -> Duration {
    action.repeat_delay.unwrap_or(settings.repeat_delay)
}

/// Never zero, so a repeat loop always moves time forward
pub fn repeat_rate(action: &Action, settings: &Settings) -> Duration {
    action
        .repeat_rate
        .unwrap_or(settings.repeat_rate)
        .max(Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{ClickType, TriggerKey};
    use crate::Key;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));

        clock.set(start);
        assert_eq!(clock.now() - start, Duration::from_millis(250));
    }

    #[test]
    fn test_trigger_override_wins() {
        let settings = Settings::default();
        let mut trigger = Trigger::single(TriggerKey::key(Key::A, ClickType::LongPress));

        assert_eq!(long_press_delay(&trigger, &settings), settings.long_press_delay);

        trigger.long_press_delay = Some(Duration::from_millis(900));
        assert_eq!(long_press_delay(&trigger, &settings), Duration::from_millis(900));
        assert_eq!(sequence_timeout(&trigger, &settings), settings.sequence_trigger_timeout);
    }

    #[test]
    fn test_repeat_rate_never_zero() {
        let settings = Settings::default();
        let action = Action::key(Key::A).with_repeat_timing(Duration::ZERO, Duration::ZERO);
        assert_eq!(repeat_rate(&action, &settings), Duration::from_millis(1));
        assert_eq!(repeat_delay(&action, &settings), Duration::ZERO);
    }
}
