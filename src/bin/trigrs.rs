// Trigrs CLI
// Validates key map files and replays scripted input traces on a virtual clock

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use trigrs_core::{
    ActionData, Clock, CompiledTriggerSet, Config, ConstraintSnapshot, Host, InputEventAction,
    KeyEvent, KeyMap, ManualClock, MetaState, Settings, StaticConstraintSnapshot, Trace,
    TraceInput, TriggerEngine,
};

/// Trigger detection and action dispatch harness
#[derive(Parser, Debug)]
#[command(name = "trigrs")]
#[command(version)]
#[command(about = "Validate trigger key maps and replay input traces against them", long_about = None)]
struct Args {
    /// TOML key map file
    #[arg(short, long, value_name = "CONFIG")]
    config: PathBuf,

    /// TOML settings file (default: ~/.config/trigrs/settings.toml)
    #[arg(short, long, value_name = "SETTINGS")]
    settings: Option<PathBuf>,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// Replay a TOML event trace and print every host call
    #[arg(short, long, value_name = "TRACE")]
    replay: Option<PathBuf>,

    /// Constraint flags the replay host reports as set (can be used multiple times)
    #[arg(long, value_name = "FLAG")]
    flag: Vec<String>,

    /// Foreground app the replay host reports
    #[arg(long, value_name = "APP")]
    foreground_app: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Prints what the engine asks for, stamped with virtual time.
struct PrintingHost {
    clock: ManualClock,
    start: Instant,
    snapshot: StaticConstraintSnapshot,
}

impl PrintingHost {
    fn elapsed_ms(&self) -> u128 {
        self.clock.now().saturating_duration_since(self.start).as_millis()
    }
}

impl Host for PrintingHost {
    fn perform(&mut self, action: &ActionData, input_action: InputEventAction, meta_state: MetaState) {
        if meta_state.is_empty() {
            println!("{:>7} ms  perform {} {}", self.elapsed_ms(), action, input_action);
        } else {
            println!(
                "{:>7} ms  perform {} {} {:?}",
                self.elapsed_ms(),
                action,
                input_action,
                meta_state
            );
        }
    }

    fn resynthesize(&mut self, event: &KeyEvent, input_action: InputEventAction) {
        println!("{:>7} ms  replay {} {}", self.elapsed_ms(), event.key, input_action);
    }

    fn vibrate(&mut self, duration: Duration) {
        println!("{:>7} ms  vibrate {} ms", self.elapsed_ms(), duration.as_millis());
    }

    fn show_triggered_toast(&mut self) {
        println!("{:>7} ms  toast", self.elapsed_ms());
    }

    fn constraint_snapshot(&self) -> Box<dyn ConstraintSnapshot + '_> {
        Box::new(self.snapshot.clone())
    }
}

fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Settings::load_default().context("Failed to load default settings"),
    }
}

fn check_config(key_maps: &[KeyMap]) {
    let compiled = CompiledTriggerSet::compile(key_maps);
    println!(
        "Configuration is valid: {} of {} key maps active ({} parallel, {} sequence)",
        compiled.len(),
        key_maps.len(),
        compiled.parallel.len(),
        compiled.sequence.len()
    );
}

fn replay(args: &Args, key_maps: &[KeyMap], settings: Settings, trace_path: &Path) -> Result<()> {
    let trace = Trace::from_toml_path(trace_path)
        .with_context(|| format!("Failed to load trace from {}", trace_path.display()))?;

    let mut snapshot = StaticConstraintSnapshot::default();
    snapshot.foreground_app = args.foreground_app.clone();
    for flag in &args.flag {
        snapshot = snapshot.with_flag(flag.clone());
    }

    let clock = ManualClock::new();
    let host = PrintingHost {
        clock: clock.clone(),
        start: clock.now(),
        snapshot,
    };
    let mut engine = TriggerEngine::with_clock(host, clock).with_settings(settings);
    engine.load_key_maps(key_maps);

    let mut now = Duration::ZERO;
    for step in &trace.steps {
        engine.advance_by(step.at.saturating_sub(now));
        now = step.at;

        let (label, consumed) = match &step.input {
            TraceInput::Event(event) => (format!("{:?}", event), engine.on_input_event(event)),
            TraceInput::Motion(motion) => (
                format!("motion x={} y={}", motion.axis_hat_x, motion.axis_hat_y),
                engine.on_motion_event(motion),
            ),
        };
        let verdict = if consumed { "consumed" } else { "passed" };
        println!("{:>7} ms  {} {}", now.as_millis(), verdict, label);
    }

    engine.advance_by(trace.tail);
    engine.reset();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::from_toml_path(&args.config)
        .with_context(|| format!("Failed to load key maps from {}", args.config.display()))?;
    let key_maps = config.to_models();

    if args.check_config {
        check_config(&key_maps);
        return Ok(());
    }

    let Some(trace_path) = args.replay.clone() else {
        bail!("Nothing to do: pass --check-config or --replay <TRACE>");
    };
    let settings = load_settings(args.settings.as_deref())?;
    replay(&args, &key_maps, settings, &trace_path)
}
