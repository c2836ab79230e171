//! lutsynth: play a chord on the default output device and exit.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use lutsynth_backend::audio_device::OutputHost;
use lutsynth_backend::{CallbackSlot, LoadMonitor, SynthControl, build_engine};
use lutsynth_core::{EngineConfig, OSCILLATOR_COUNT, OscId, load_config};

mod cli;
mod keymap;

use cli::Cli;

/// Moving-average weight for callback timing.
const LOAD_EMA_ALPHA: f64 = 0.05;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let notes = parse_keys(&cli.keys)?;

    let (control, mixer) = build_engine(&config);
    apply_overrides(&control, &cli);

    let sample_rate = config.sample_rate as f32;
    let monitor = Arc::new(LoadMonitor::new(
        config.buffer_frames as usize,
        sample_rate,
        LOAD_EMA_ALPHA,
    ));
    let slot = Arc::new(CallbackSlot::new(
        Box::new(mixer),
        sample_rate,
        2,
        Arc::clone(&monitor),
    ));

    let mut host = OutputHost::open(Arc::clone(&slot), config.sample_rate, config.buffer_frames)
        .context("opening audio output")?;
    host.start().context("starting audio output")?;

    for (id, (key, ratio)) in OscId::ALL.into_iter().zip(&notes) {
        control.key_on(id, *ratio);
        info!("{id}: key '{key}' at octave {}", control.octave());
    }

    thread::sleep(Duration::from_secs_f32(cli.seconds.max(0.0)));

    control.all_notes_off();
    let tail_ms = OscId::ALL
        .iter()
        .map(|&id| control.envelope_settings(id).release_ms)
        .fold(0.0f32, f32::max);
    thread::sleep(Duration::from_secs_f32(tail_ms / 1000.0));
    control.reclaim_retired_tables();

    host.stop().context("stopping audio output")?;
    info!("{}", monitor.snapshot());
    host.close();

    Ok(())
}

fn parse_keys(keys: &str) -> Result<Vec<(char, f32)>> {
    let mut notes = Vec::with_capacity(OSCILLATOR_COUNT);
    for key in keys.chars() {
        let Some(ratio) = keymap::key_ratio(key) else {
            bail!("'{key}' is not on the key row ({})", keymap::KEY_ROW.iter().collect::<String>());
        };
        notes.push((key, ratio));
    }
    if notes.len() > OSCILLATOR_COUNT {
        warn!("only the first {OSCILLATOR_COUNT} keys are played");
        notes.truncate(OSCILLATOR_COUNT);
    }
    Ok(notes)
}

fn apply_overrides(control: &SynthControl, cli: &Cli) {
    for id in OscId::ALL {
        if let Some(pulse_width) = cli.pulse_width {
            control.set_pulse_width(id, pulse_width);
        }
        if let Some(waveform) = cli.waveform {
            control.set_waveform(id, waveform);
        }
    }
    control.set_octave(cli.octave);
}
