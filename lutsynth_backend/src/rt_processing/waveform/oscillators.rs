use crossbeam::atomic::AtomicCell;
use lutsynth_core::{OscId, OscillatorConfig, Waveform};

use super::envelopes::{AdsrEnvelope, EnvelopeSnapshot};
use super::tables::{Wavetable, advance_phase};

/// Oscillator parameters written by the control thread and read by the audio
/// thread. Every field is independently atomic.
pub struct OscillatorParams {
    id: OscId,
    waveform: AtomicCell<Waveform>,
    pulse_width: AtomicCell<f32>,
    amplitude: AtomicCell<f32>,
    left_increment: AtomicCell<f32>,
    right_increment: AtomicCell<f32>,
    envelope: AdsrEnvelope,
    /// Freshly generated table waiting for the audio thread to pick up
    pending_table: AtomicCell<Option<Box<Wavetable>>>,
}

impl OscillatorParams {
    pub fn new(id: OscId, sample_rate: f32, config: &OscillatorConfig) -> Self {
        Self {
            id,
            waveform: AtomicCell::new(config.waveform),
            pulse_width: AtomicCell::new(config.pulse_width.clamp(0.0, 1.0)),
            amplitude: AtomicCell::new(config.amplitude),
            left_increment: AtomicCell::new(1.0),
            right_increment: AtomicCell::new(1.0),
            envelope: AdsrEnvelope::new(sample_rate, &config.envelope),
            pending_table: AtomicCell::new(None),
        }
    }

    pub fn id(&self) -> OscId {
        self.id
    }

    pub fn envelope(&self) -> &AdsrEnvelope {
        &self.envelope
    }

    // Setters for runtime modification

    pub fn set_waveform(&self, waveform: Waveform) {
        self.waveform.store(waveform);
    }

    pub fn set_pulse_width(&self, pulse_width: f32) {
        self.pulse_width.store(pulse_width.clamp(0.0, 1.0));
    }

    /// Per-oscillator gain. Passed through unclamped.
    pub fn set_amplitude(&self, amplitude: f32) {
        self.amplitude.store(amplitude);
    }

    /// Non-finite increments are stored as 0 so a bad write cannot leave the
    /// phase stuck at NaN.
    pub fn set_increments(&self, left: f32, right: f32) {
        self.left_increment.store(finite_or_zero(left));
        self.right_increment.store(finite_or_zero(right));
    }

    /// Hand a new table to the audio thread.
    ///
    /// Returns the previously pending table if the audio thread never
    /// collected it, so it is dropped on the caller's thread.
    pub fn publish_table(&self, table: Box<Wavetable>) -> Option<Box<Wavetable>> {
        self.pending_table.swap(Some(table))
    }

    /// Take the pending table, if any. Lock-free.
    #[inline]
    pub fn take_pending_table(&self) -> Option<Box<Wavetable>> {
        self.pending_table.take()
    }

    // Getters

    pub fn waveform(&self) -> Waveform {
        self.waveform.load()
    }

    pub fn pulse_width(&self) -> f32 {
        self.pulse_width.load()
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude.load()
    }

    pub fn increments(&self) -> (f32, f32) {
        (self.left_increment.load(), self.right_increment.load())
    }

    /// Everything the mixer needs for one buffer, read once
    #[inline]
    pub fn snapshot(&self) -> VoiceSnapshot {
        VoiceSnapshot {
            envelope: self.envelope.snapshot(),
            amplitude: self.amplitude.load(),
            left_increment: self.left_increment.load(),
            right_increment: self.right_increment.load(),
        }
    }
}

#[inline]
fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Per-buffer copy of an oscillator's parameters
#[derive(Debug, Clone, Copy)]
pub struct VoiceSnapshot {
    pub envelope: EnvelopeSnapshot,
    pub amplitude: f32,
    pub left_increment: f32,
    pub right_increment: f32,
}

/// Audio-thread side of an oscillator: the table it is playing and its
/// stereo phase accumulators.
pub struct Oscillator {
    id: OscId,
    table: Box<Wavetable>,
    left_phase: f32,
    right_phase: f32,
}

impl Oscillator {
    pub fn new(id: OscId, table: Box<Wavetable>) -> Self {
        Self {
            id,
            table,
            left_phase: 0.0,
            right_phase: 0.0,
        }
    }

    pub fn id(&self) -> OscId {
        self.id
    }

    /// Swap in a new table, returning the one that was playing
    #[inline]
    pub fn replace_table(&mut self, table: Box<Wavetable>) -> Box<Wavetable> {
        std::mem::replace(&mut self.table, table)
    }

    pub fn table(&self) -> &Wavetable {
        &self.table
    }

    #[inline]
    pub fn interpolate_left(&self) -> f32 {
        self.table.interpolate(self.left_phase)
    }

    #[inline]
    pub fn interpolate_right(&self) -> f32 {
        self.table.interpolate(self.right_phase)
    }

    /// Step both phase accumulators by one frame
    #[inline]
    pub fn advance(&mut self, left_increment: f32, right_increment: f32) {
        self.left_phase = advance_phase(self.left_phase, left_increment);
        self.right_phase = advance_phase(self.right_phase, right_increment);
    }

    pub fn phases(&self) -> (f32, f32) {
        (self.left_phase, self.right_phase)
    }

    pub fn set_phases(&mut self, left: f32, right: f32) {
        self.left_phase = advance_phase(0.0, left);
        self.right_phase = advance_phase(0.0, right);
    }
}
