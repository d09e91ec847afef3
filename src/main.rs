#![allow(clippy::collapsible_if)]

mod cli;
mod enumerate;

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, RandomizeArgs, RunArgs};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

use ccmod::controller::Controller;
use ccmod::midi::{MidirTransport, OutputHandle};
use ccmod::registry::{ExceptionEdit, Registry, SliderEdit};
use ccmod::scheduler::{self, Scheduler};
use ccmod::session::{self, SessionState};
use ccmod::{config, message::ChannelSpec};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        config::init(config::load(path)?);
    }

    match cli.command {
        Command::Enumerate => {
            env_logger::init();
            enumerate::midi(config::client_name())
        }
        Command::Run(args) => run(args),
        Command::Randomize(args) => {
            env_logger::init();
            randomize(args)
        }
        Command::Init { session, force } => {
            env_logger::init();
            init_session(&session, force)
        }
    }
}

/// Custom logger that writes to stderr with \r\n line endings for raw mode.
struct RawModeLogger;

impl log::Log for RawModeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let now = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default();
            let secs = now.as_secs() % 86400; // time of day
            let h = secs / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            let ms = now.subsec_millis();
            let _ = write!(
                std::io::stderr(),
                "[{h:02}:{m:02}:{s:02}.{ms:03} {}] {}\r\n",
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static RAW_MODE_LOGGER: RawModeLogger = RawModeLogger;

/// Start the output thread, or fall back to a no-op handle when the
/// platform has no MIDI. Selects the output matching `filter`.
fn open_output(filter: &str) -> OutputHandle {
    let mut output = match MidirTransport::new(config::client_name()) {
        Ok(transport) => OutputHandle::spawn(Box::new(transport), config::output_queue()),
        Err(e) => {
            log::error!("MIDI is not available ({e}); sliders will not send anything");
            return OutputHandle::disconnected();
        }
    };

    match Some(filter).filter(|f| !f.is_empty()) {
        Some(f) => match output.find(f) {
            Some(o) => output.select(Some(o)),
            None => log::warn!(
                "MIDI output '{}' not found (available: {})",
                f,
                output
                    .outputs()
                    .iter()
                    .map(|o| o.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
        None => log::info!("No MIDI output chosen; press 'd' to pick one"),
    }
    output
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    // Set up raw mode logger early so device messages are visible
    log::set_logger(&RAW_MODE_LOGGER).ok();
    log::set_max_level(
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
    );

    let state = session::load(&args.session)?;
    let filter = args.device.as_deref().unwrap_or(state.selected_device_name.as_str());
    let output = open_output(filter);

    let registry = Registry::from_state(&state);
    log::info!(
        "Loaded {} slider(s), {} CC exception(s)",
        registry.sliders().len(),
        registry.exceptions().len()
    );
    for slider in registry.sliders() {
        match &slider.lfo {
            Some(lfo) => log::info!(
                "  slider {}: {:?} ch={} cc={} lfo={} {} {:.4}Hz [{}..{}]",
                slider.id,
                slider.kind,
                slider.channel,
                slider.cc_number,
                if lfo.enabled { "on" } else { "off" },
                lfo.waveform.name(),
                lfo.frequency,
                lfo.min_amplitude,
                lfo.max_amplitude
            ),
            None => log::info!(
                "  slider {}: {:?} ch={} cc={} value={}",
                slider.id,
                slider.kind,
                slider.channel,
                slider.cc_number,
                slider.value
            ),
        }
    }
    let mut controller = Controller::new(registry, output);

    let mut sched = Scheduler::new(config::tick_interval());
    sched.start(Instant::now());
    log::info!("Modulating every {:?}", sched.interval());

    crossterm::terminal::enable_raw_mode()?;
    log::info!("Running. r: random CCs, p: random programs, d: next device, s: save, Ctrl+Q to quit.");

    let result = (|| -> anyhow::Result<()> {
        loop {
            if event::poll(Duration::from_millis(5))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if key.modifiers.contains(KeyModifiers::CONTROL) {
                        if matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
                            break;
                        }
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('r') => {
                            controller.randomize_ccs();
                        }
                        KeyCode::Char('p') => {
                            controller.randomize_programs();
                        }
                        KeyCode::Char('d') => {
                            controller.sink_mut().select_next();
                            sched.restart(Instant::now());
                        }
                        KeyCode::Char('s') => {
                            let name = controller
                                .sink()
                                .selected()
                                .map(|o| o.name.clone())
                                .unwrap_or_default();
                            match session::save(&args.session, &controller.registry().to_state(name)) {
                                Ok(()) => log::info!("Saved {}", args.session.display()),
                                Err(e) => log::error!("Save failed: {e:#}"),
                            }
                        }
                        _ => {}
                    }
                }
            }

            if sched.poll(Instant::now()) {
                let changed = controller.tick(scheduler::now_ms());
                if changed > 0 {
                    log::trace!("tick: {changed} slider(s) changed");
                }
            }
        }
        Ok(())
    })();

    sched.stop();
    crossterm::terminal::disable_raw_mode()?;
    log::info!("Stopping...");
    controller.sink_mut().stop();
    result
}

fn randomize(args: RandomizeArgs) -> anyhow::Result<()> {
    let state = session::load(&args.session)?;
    let filter = args.device.as_deref().unwrap_or(state.selected_device_name.as_str());
    let output = open_output(filter);
    if output.selected().is_none() {
        anyhow::bail!("no MIDI output selected; pass --device (see `ccmod enumerate`)");
    }

    let mut controller = Controller::new(Registry::from_state(&state), output);
    let sent = if args.programs {
        controller.randomize_programs()
    } else {
        controller.randomize_ccs()
    };
    // Joins the output thread once the queued batch is delivered.
    controller.sink_mut().stop();
    println!("Sent {sent} message(s)");
    Ok(())
}

fn init_session(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let mut registry = Registry::new();
    let id = registry.add_slider();
    registry.update_slider(id, SliderEdit::CcNumber(74));
    registry.update_slider(id, SliderEdit::LfoEnabled(true));
    registry.update_slider(id, SliderEdit::LfoFrequency(0.5));
    let ex = registry.add_exception();
    registry.update_exception(ex, ExceptionEdit::CcNumber(7));
    registry.update_exception(ex, ExceptionEdit::Channel(ChannelSpec::All));

    let state: SessionState = registry.to_state(String::new());
    session::save(path, &state).with_context(|| format!("creating {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
