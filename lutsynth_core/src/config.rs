//! Startup configuration for the engine.
//!
//! Only initial settings live here; nothing the control surface changes at
//! runtime is written back.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BUFFER_FRAMES, ConfigError, SAMPLE_RATE, Waveform};

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Output sample rate in Hz (default: 48000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Frames per output buffer requested from the backend (default: 512)
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: u32,

    /// Gain applied to the summed oscillators (default: 0.1). Not clamped.
    #[serde(default = "default_master_amplitude")]
    pub master_amplitude: f32,

    /// Initial settings shared by every oscillator
    #[serde(default)]
    pub oscillator: OscillatorConfig,
}

fn default_sample_rate() -> u32 { SAMPLE_RATE }
fn default_buffer_frames() -> u32 { BUFFER_FRAMES }
fn default_master_amplitude() -> f32 { 0.1 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_frames: default_buffer_frames(),
            master_amplitude: default_master_amplitude(),
            oscillator: OscillatorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(invalid("sample_rate must be between 8000 and 192000"));
        }
        if !(16..=8192).contains(&self.buffer_frames) {
            return Err(invalid("buffer_frames must be between 16 and 8192"));
        }
        if !self.master_amplitude.is_finite() {
            return Err(invalid("master_amplitude must be a finite number"));
        }
        self.oscillator.validate()
    }
}

/// Initial oscillator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscillatorConfig {
    #[serde(default)]
    pub waveform: Waveform,

    /// Square pulse width / triangle duty cycle in [0, 1] (default: 0.5)
    #[serde(default = "default_pulse_width")]
    pub pulse_width: f32,

    #[serde(default = "default_amplitude")]
    pub amplitude: f32,

    #[serde(default)]
    pub envelope: EnvelopeConfig,
}

fn default_pulse_width() -> f32 { 0.5 }
fn default_amplitude() -> f32 { 1.0 }

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::default(),
            pulse_width: default_pulse_width(),
            amplitude: default_amplitude(),
            envelope: EnvelopeConfig::default(),
        }
    }
}

impl OscillatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.pulse_width) {
            return Err(invalid("pulse_width must be between 0.0 and 1.0"));
        }
        if !self.amplitude.is_finite() {
            return Err(invalid("amplitude must be a finite number"));
        }
        self.envelope.validate()
    }
}

/// ADSR knob values. Times are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    #[serde(default)]
    pub attack_ms: f32,

    #[serde(default)]
    pub decay_ms: f32,

    #[serde(default = "default_sustain_level")]
    pub sustain_level: f32,

    #[serde(default = "default_release_ms")]
    pub release_ms: f32,
}

fn default_sustain_level() -> f32 { 1.0 }
fn default_release_ms() -> f32 { 0.01 }

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack_ms: 0.0,
            decay_ms: 0.0,
            sustain_level: default_sustain_level(),
            release_ms: default_release_ms(),
        }
    }
}

impl EnvelopeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("attack_ms", self.attack_ms),
            ("decay_ms", self.decay_ms),
            ("release_ms", self.release_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number of milliseconds"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.sustain_level) {
            return Err(invalid("sustain_level must be between 0.0 and 1.0"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

/// Load and validate configuration from a JSON file
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.buffer_frames, 512);
        assert_eq!(config.master_amplitude, 0.1);
        assert_eq!(config.oscillator.waveform, Waveform::Square);
        assert_eq!(config.oscillator.envelope.release_ms, 0.01);
    }

    #[test]
    fn test_load_partial_config() {
        let json = r#"{
            "master_amplitude": 0.5,
            "oscillator": {
                "waveform": "triangle",
                "pulse_width": 0.25,
                "envelope": { "attack_ms": 120.0, "sustain_level": 0.6 }
            }
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.master_amplitude, 0.5);
        assert_eq!(config.oscillator.waveform, Waveform::Triangle);
        assert_eq!(config.oscillator.pulse_width, 0.25);
        assert_eq!(config.oscillator.envelope.attack_ms, 120.0);
        assert_eq!(config.oscillator.envelope.decay_ms, 0.0);
        assert_eq!(config.oscillator.envelope.sustain_level, 0.6);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = EngineConfig::default();
        config.sample_rate = 1_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.oscillator.pulse_width = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.oscillator.envelope.decay_ms = -3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reports_parse_and_io_errors() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));

        let missing = Path::new("/definitely/not/here/lutsynth.json");
        assert!(matches!(load_config(missing), Err(ConfigError::Io { .. })));
    }
}
