use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use crossbeam::queue::ArrayQueue;
use log::info;
use lutsynth_core::{EngineConfig, OSCILLATOR_COUNT, OscId};

use crate::control::SynthControl;
use crate::rt_processing::clock::SampleClock;
use crate::rt_processing::mixer::Mixer;
use crate::rt_processing::waveform::{OscillatorParams, Wavetable};

/// Status text for the post-shutdown completion message.
pub const STATUS_MESSAGE: &str = "Synth End";

/// State shared between the control surface and the mixer.
pub struct EngineShared {
    oscillators: [OscillatorParams; OSCILLATOR_COUNT],
    master_amplitude: AtomicCell<f32>,
    clock: SampleClock,
    /// Tables the mixer has stopped playing, waiting to be freed off the
    /// audio thread
    retired_tables: ArrayQueue<Box<Wavetable>>,
    status: &'static str,
}

impl EngineShared {
    fn new(config: &EngineConfig) -> Self {
        let sample_rate = config.sample_rate as f32;
        Self {
            oscillators: OscId::ALL
                .map(|id| OscillatorParams::new(id, sample_rate, &config.oscillator)),
            master_amplitude: AtomicCell::new(config.master_amplitude),
            clock: SampleClock::new(sample_rate),
            retired_tables: ArrayQueue::new(OSCILLATOR_COUNT * 4),
            status: STATUS_MESSAGE,
        }
    }

    #[inline]
    pub fn oscillator(&self, id: OscId) -> &OscillatorParams {
        &self.oscillators[id.index()]
    }

    pub fn oscillators(&self) -> &[OscillatorParams] {
        &self.oscillators
    }

    #[inline]
    pub fn master_amplitude(&self) -> f32 {
        self.master_amplitude.load()
    }

    /// Gain applied to the summed oscillators. Not clamped.
    pub fn set_master_amplitude(&self, amplitude: f32) {
        self.master_amplitude.store(amplitude);
    }

    pub fn clock(&self) -> &SampleClock {
        &self.clock
    }

    pub fn status(&self) -> &'static str {
        self.status
    }

    /// Queue a replaced table for release on a control thread.
    ///
    /// Hands the table back if the queue is full.
    #[inline]
    pub fn retire_table(&self, table: Box<Wavetable>) -> Result<(), Box<Wavetable>> {
        self.retired_tables.push(table)
    }

    pub fn take_retired_table(&self) -> Option<Box<Wavetable>> {
        self.retired_tables.pop()
    }
}

/// Build an engine from `config`.
///
/// Returns the control surface for non-realtime threads and the mixer to
/// register as the audio callback. Both see the same oscillators, clock and
/// master amplitude.
pub fn build_engine(config: &EngineConfig) -> (SynthControl, Mixer) {
    let shared = Arc::new(EngineShared::new(config));

    let initial = Wavetable::new(config.oscillator.waveform, config.oscillator.pulse_width);
    let mixer = Mixer::new(
        Arc::clone(&shared),
        OscId::ALL.map(|_| Box::new(initial.clone())),
    );
    let control = SynthControl::new(shared, initial);

    info!(
        "engine ready: {} oscillators, {} Hz, {} waveform",
        OSCILLATOR_COUNT, config.sample_rate, config.oscillator.waveform
    );
    (control, mixer)
}
