use std::path::PathBuf;

use clap::Parser;
use lutsynth_core::Waveform;

/// Headless player for the three-oscillator lookup-table synth
#[derive(Parser, Debug)]
#[command(name = "lutsynth", version, about)]
pub struct Cli {
    /// Engine configuration file (JSON). Built-in defaults when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How long to hold the notes, in seconds
    #[arg(short, long, default_value_t = 2.0)]
    pub seconds: f32,

    /// Keys from the bottom keyboard row, one per oscillator (at most 3)
    #[arg(short, long, default_value = "zcb")]
    pub keys: String,

    /// Waveform for every oscillator (sawtooth, sine, square, triangle, silence)
    #[arg(short, long)]
    pub waveform: Option<Waveform>,

    /// Square pulse width or triangle duty cycle
    #[arg(short, long)]
    pub pulse_width: Option<f32>,

    /// Octave multiplier, a power of two from 1 to 64
    #[arg(short, long, default_value_t = 1)]
    pub octave: u32,
}
