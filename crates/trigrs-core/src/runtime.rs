// Trigrs Runtime
// Runs an engine's timed work on a background thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::event::InputEvent;
use crate::host::Host;
use crate::matcher::TriggerEngine;
use crate::timing::SystemClock;

struct Shared<H: Host> {
    engine: Mutex<TriggerEngine<H, SystemClock>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
}

/// A [`TriggerEngine`] driven by a timer thread.
///
/// Input is still delivered serially through [`on_input_event`](Self::on_input_event);
/// the engine lock makes input handling and timed work mutually exclusive.
pub struct Runtime<H: Host + Send + 'static> {
    shared: Arc<Shared<H>>,
    timer: Option<JoinHandle<()>>,
}

impl<H: Host + Send + 'static> Runtime<H> {
    pub fn start(engine: TriggerEngine<H, SystemClock>) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            engine: Mutex::new(engine),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let timer_shared = Arc::clone(&shared);
        let timer = thread::Builder::new()
            .name("trigrs-timer".into())
            .spawn(move || run_timer(&timer_shared))?;

        Ok(Self {
            shared,
            timer: Some(timer),
        })
    }

    /// Handle one event. Returns whether it must be suppressed.
    pub fn on_input_event(&self, event: &InputEvent) -> bool {
        let consume = self.shared.engine.lock().on_input_event(event);
        self.shared.wakeup.notify_one();
        consume
    }

    /// Run `f` with exclusive access to the engine, e.g. to reload key maps.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut TriggerEngine<H, SystemClock>) -> R) -> R {
        let result = f(&mut self.shared.engine.lock());
        self.shared.wakeup.notify_one();
        result
    }

    /// Stop the timer thread and release everything held down.
    pub fn shutdown(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };

        self.shared.shutdown.store(true, Ordering::SeqCst);
        {
            let _engine = self.shared.engine.lock();
            self.shared.wakeup.notify_all();
        }
        if timer.join().is_err() {
            log::warn!("Timer thread panicked");
        }

        self.shared.engine.lock().reset();
        log::debug!("Runtime stopped");
    }
}

impl<H: Host + Send + 'static> Drop for Runtime<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer<H: Host>(shared: &Shared<H>) {
    log::debug!("Timer thread started");
    let mut engine = shared.engine.lock();

    while !shared.shutdown.load(Ordering::SeqCst) {
        engine.on_tick();
        match engine.next_deadline() {
            Some(deadline) => {
                shared.wakeup.wait_until(&mut engine, deadline);
            }
            None => shared.wakeup.wait(&mut engine),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::action::{Action, ActionData, InputEventAction};
    use crate::event::{DeviceInfo, KeyEvent, MetaState};
    use crate::keymap::KeyMap;
    use crate::settings::Settings;
    use crate::trigger::{ClickType, Trigger, TriggerKey};
    use crate::Key;

    #[derive(Default)]
    struct CountingHost {
        performed: Arc<Mutex<Vec<InputEventAction>>>,
    }

    impl Host for CountingHost {
        fn perform(&mut self, _action: &ActionData, input_action: InputEventAction, _meta: MetaState) {
            self.performed.lock().push(input_action);
        }

        fn resynthesize(&mut self, _event: &KeyEvent, _input_action: InputEventAction) {}
    }

    #[test]
    fn test_long_press_fires_from_timer_thread() {
        let host = CountingHost::default();
        let performed = Arc::clone(&host.performed);

        let mut settings = Settings::default();
        settings.long_press_delay = Duration::from_millis(20);
        let mut engine = TriggerEngine::new(host).with_settings(settings);
        engine.load_key_maps(&[KeyMap::new(
            "long-a",
            Trigger::single(TriggerKey::key(Key::A, ClickType::LongPress)),
            vec![Action::key(Key::B)],
        )]);

        let mut runtime = Runtime::start(engine).unwrap();
        let device = DeviceInfo::internal(0, "kbd");
        assert!(runtime.on_input_event(&InputEvent::Key(KeyEvent::down(Key::A, device))));

        let started = Instant::now();
        while performed.lock().is_empty() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*performed.lock(), vec![InputEventAction::DownUp]);

        runtime.shutdown();
    }
}
