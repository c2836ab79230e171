//! Shared types for the lookup-table synthesizer: oscillator identifiers,
//! waveform selection, engine constants and startup configuration.

pub mod config;
pub mod error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use config::{EngineConfig, EnvelopeConfig, OscillatorConfig, load_config};
pub use error::ConfigError;

/// Number of samples in one wavetable period.
pub const TABLE_SIZE: usize = 872;

/// Default output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

/// Default number of frames per output buffer.
pub const BUFFER_FRAMES: u32 = 512;

/// Number of oscillators in the engine.
pub const OSCILLATOR_COUNT: usize = 3;

/// Stable identifier for one of the engine's oscillators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OscId {
    A,
    B,
    C,
}

impl OscId {
    pub const ALL: [OscId; OSCILLATOR_COUNT] = [OscId::A, OscId::B, OscId::C];

    /// Position of this oscillator in engine-owned arrays
    #[inline]
    pub fn index(self) -> usize {
        match self {
            OscId::A => 0,
            OscId::B => 1,
            OscId::C => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Single-character label used by display layers
    pub fn label(self) -> char {
        match self {
            OscId::A => 'A',
            OscId::B => 'B',
            OscId::C => 'C',
        }
    }
}

impl fmt::Display for OscId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oscillator {}", self.label())
    }
}

/// Waveform shapes an oscillator's table can hold.
///
/// Declaration order matches the selector index exposed to control layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Waveform {
    Sawtooth,
    Sine,
    #[default]
    Square,
    Triangle,
    Silence,
}

impl Waveform {
    pub const ALL: [Waveform; 5] = [
        Waveform::Sawtooth,
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Silence,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sawtooth => "Sawtooth",
            Waveform::Sine => "Sine",
            Waveform::Square => "Square",
            Waveform::Triangle => "Triangle",
            Waveform::Silence => "Silence",
        }
    }

    /// Whether the pulse-width/duty parameter changes this waveform's table
    pub fn uses_shape(self) -> bool {
        matches!(self, Waveform::Square | Waveform::Triangle)
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "saw" | "sawtooth" => Ok(Waveform::Sawtooth),
            "sin" | "sine" => Ok(Waveform::Sine),
            "sqr" | "square" => Ok(Waveform::Square),
            "tri" | "triangle" => Ok(Waveform::Triangle),
            "silence" | "off" => Ok(Waveform::Silence),
            other => Err(ConfigError::UnknownWaveform(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osc_id_indices_round_trip() {
        for (i, id) in OscId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(OscId::from_index(i), Some(*id));
        }
        assert_eq!(OscId::from_index(3), None);
        assert_eq!(OscId::B.to_string(), "Oscillator B");
    }

    #[test]
    fn test_waveform_selector_order() {
        assert_eq!(Waveform::from_index(0), Some(Waveform::Sawtooth));
        assert_eq!(Waveform::from_index(2), Some(Waveform::Square));
        assert_eq!(Waveform::from_index(4), Some(Waveform::Silence));
        assert_eq!(Waveform::default(), Waveform::Square);
    }

    #[test]
    fn test_waveform_parsing() {
        assert_eq!("Sine".parse::<Waveform>().unwrap(), Waveform::Sine);
        assert_eq!(" tri ".parse::<Waveform>().unwrap(), Waveform::Triangle);
        assert!(matches!(
            "wobble".parse::<Waveform>(),
            Err(ConfigError::UnknownWaveform(name)) if name == "wobble"
        ));
    }
}
