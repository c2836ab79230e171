pub mod tables;
pub mod oscillators;
pub mod envelopes;

pub use envelopes::{AdsrEnvelope, EnvelopeSnapshot, EnvelopeState};
pub use oscillators::{Oscillator, OscillatorParams, VoiceSnapshot};
pub use tables::Wavetable;
