pub mod callback;
pub mod clock;
pub mod mixer;
pub mod performance;
pub mod waveform;
