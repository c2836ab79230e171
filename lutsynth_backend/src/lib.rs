//! Real-time engine for the lookup-table synthesizer.
//!
//! [`build_engine`] returns the two halves of the engine: a [`Mixer`] to run
//! on the audio thread (usually through a [`CallbackSlot`]) and a
//! [`SynthControl`] for everything else.

pub mod control;
pub mod engine;
pub mod rt_processing;

#[cfg(feature = "output")]
pub mod audio_device;

pub use control::SynthControl;
pub use engine::{EngineShared, build_engine};
pub use rt_processing::callback::{AudioCallback, CallbackSlot, StreamControl};
pub use rt_processing::mixer::Mixer;
pub use rt_processing::performance::{LoadMonitor, LoadSnapshot};
pub use rt_processing::waveform::Wavetable;
