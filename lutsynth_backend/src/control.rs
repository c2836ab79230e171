//! Control surface for non-realtime threads.
//!
//! Every write lands in an atomic cell or a lock-free mailbox the mixer reads
//! at the start of its next buffer; nothing here can block the audio thread.

use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use log::{debug, warn};
use lutsynth_core::{EnvelopeConfig, OSCILLATOR_COUNT, OscId, TABLE_SIZE, Waveform};
use parking_lot::Mutex;

use crate::engine::EngineShared;
use crate::rt_processing::waveform::{OscillatorParams, Wavetable};

/// Lowest octave multiplier.
pub const MIN_OCTAVE: u32 = 1;
/// Highest octave multiplier.
pub const MAX_OCTAVE: u32 = 64;

/// Parameter writes and display reads for the engine's oscillators.
///
/// `Sync`: several control threads may share one surface.
pub struct SynthControl {
    shared: Arc<EngineShared>,
    /// Control-side copy of each oscillator's table. Regenerated in place,
    /// then cloned and published to the mixer.
    tables: Mutex<[Wavetable; OSCILLATOR_COUNT]>,
    octave: AtomicCell<u32>,
}

impl SynthControl {
    pub(crate) fn new(shared: Arc<EngineShared>, initial: Wavetable) -> Self {
        Self {
            shared,
            tables: Mutex::new(OscId::ALL.map(|_| initial.clone())),
            octave: AtomicCell::new(MIN_OCTAVE),
        }
    }

    pub fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }

    fn params(&self, id: OscId) -> &OscillatorParams {
        self.shared.oscillator(id)
    }

    // ---------------------------
    // Table shape
    // ---------------------------

    pub fn set_waveform(&self, id: OscId, waveform: Waveform) {
        self.params(id).set_waveform(waveform);
        self.regenerate(id);
    }

    /// Square pulse width or triangle duty cycle, clamped to [0, 1]
    pub fn set_pulse_width(&self, id: OscId, pulse_width: f32) {
        let params = self.params(id);
        params.set_pulse_width(pulse_width);
        if params.waveform().uses_shape() {
            self.regenerate(id);
        }
    }

    /// Rebuild the oscillator's table from its current selector and shape and
    /// hand a copy to the mixer.
    fn regenerate(&self, id: OscId) {
        self.reclaim_retired_tables();

        // Selector and shape are read under the lock so concurrent writers
        // always publish the latest pair last.
        let mut tables = self.tables.lock();
        let params = self.params(id);
        let waveform = params.waveform();
        let table = &mut tables[id.index()];
        table.fill(waveform, params.pulse_width());

        if params.publish_table(Box::new(table.clone())).is_some() {
            debug!("{id}: replaced a table the mixer had not picked up yet");
        }
        debug!("{id}: published {waveform} table");
    }

    /// Free tables the mixer has swapped out. Returns how many were freed.
    pub fn reclaim_retired_tables(&self) -> usize {
        let mut freed = 0;
        while let Some(table) = self.shared.take_retired_table() {
            drop(table);
            freed += 1;
        }
        freed
    }

    // ---------------------------
    // Levels and pitch
    // ---------------------------

    pub fn set_amplitude(&self, id: OscId, amplitude: f32) {
        self.params(id).set_amplitude(amplitude);
    }

    pub fn set_master_amplitude(&self, amplitude: f32) {
        self.shared.set_master_amplitude(amplitude);
    }

    /// Write raw per-channel phase increments (table samples per frame).
    ///
    /// Increments must be finite; a NaN or infinite channel is stored as 0
    /// and the oscillator holds its phase.
    pub fn set_phase_increments(&self, id: OscId, left: f32, right: f32) {
        let span = TABLE_SIZE as f32;
        if !left.is_finite() || !right.is_finite() {
            warn!("{id}: non-finite phase increment ({left}, {right}) replaced by 0");
        } else if left.abs() >= span || right.abs() >= span {
            warn!("{id}: phase increment ({left}, {right}) spans a full table per frame");
        }
        self.params(id).set_increments(left, right);
    }

    /// Set both increments so the oscillator plays `frequency` Hz
    pub fn set_frequency(&self, id: OscId, frequency: f32) {
        let increment = frequency * TABLE_SIZE as f32 / self.shared.clock().sample_rate();
        self.set_phase_increments(id, increment, increment);
    }

    pub fn set_octave(&self, multiplier: u32) {
        self.octave.store(multiplier.clamp(MIN_OCTAVE, MAX_OCTAVE));
    }

    /// Double the octave multiplier, up to [`MAX_OCTAVE`]
    pub fn octave_up(&self) -> u32 {
        self.step_octave(|octave| (octave * 2).min(MAX_OCTAVE))
    }

    /// Halve the octave multiplier, down to [`MIN_OCTAVE`]
    pub fn octave_down(&self) -> u32 {
        self.step_octave(|octave| (octave / 2).max(MIN_OCTAVE))
    }

    fn step_octave(&self, step: impl Fn(u32) -> u32) -> u32 {
        let previous = match self.octave.fetch_update(|octave| Some(step(octave))) {
            Ok(previous) | Err(previous) => previous,
        };
        step(previous)
    }

    // ---------------------------
    // Envelope
    // ---------------------------

    pub fn set_envelope(&self, id: OscId, envelope: &EnvelopeConfig) {
        self.params(id).envelope().configure(envelope);
    }

    pub fn set_attack_ms(&self, id: OscId, attack_ms: f32) {
        self.params(id).envelope().set_attack_ms(attack_ms);
    }

    pub fn set_decay_ms(&self, id: OscId, decay_ms: f32) {
        self.params(id).envelope().set_decay_ms(decay_ms);
    }

    pub fn set_sustain_level(&self, id: OscId, sustain_level: f32) {
        self.params(id).envelope().set_sustain_level(sustain_level);
    }

    pub fn set_release_ms(&self, id: OscId, release_ms: f32) {
        self.params(id).envelope().set_release_ms(release_ms);
    }

    /// Start a note. `ratio` is the key's base increment from the external
    /// key map; the octave multiplier is applied before it is written.
    ///
    /// Pitch is updated even when the note is already sounding, but its
    /// timing is not. Returns whether the envelope was triggered.
    pub fn key_on(&self, id: OscId, ratio: f32) -> bool {
        let increment = self.octave() as f32 * ratio;
        let params = self.params(id);
        params.set_increments(increment, increment);
        params.envelope().key_on(self.shared.clock().now())
    }

    pub fn key_off(&self, id: OscId) {
        self.params(id).envelope().key_off(self.shared.clock().now());
    }

    /// Release every oscillator
    pub fn all_notes_off(&self) {
        for id in OscId::ALL {
            self.key_off(id);
        }
    }

    // ---------------------------
    // Display reads
    // ---------------------------

    /// Copy of the oscillator's current table
    pub fn wavetable(&self, id: OscId) -> Wavetable {
        self.tables.lock()[id.index()].clone()
    }

    pub fn waveform(&self, id: OscId) -> Waveform {
        self.params(id).waveform()
    }

    pub fn pulse_width(&self, id: OscId) -> f32 {
        self.params(id).pulse_width()
    }

    pub fn amplitude(&self, id: OscId) -> f32 {
        self.params(id).amplitude()
    }

    pub fn master_amplitude(&self) -> f32 {
        self.shared.master_amplitude()
    }

    pub fn phase_increments(&self, id: OscId) -> (f32, f32) {
        self.params(id).increments()
    }

    pub fn envelope_settings(&self, id: OscId) -> EnvelopeConfig {
        self.params(id).envelope().settings()
    }

    /// Envelope amplitude at the current logical time
    pub fn envelope_amplitude(&self, id: OscId) -> f32 {
        self.params(id).envelope().amplitude(self.shared.clock().now())
    }

    pub fn is_note_on(&self, id: OscId) -> bool {
        self.params(id).envelope().is_note_on()
    }

    /// Logical time since the engine was built, in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.shared.clock().elapsed_ms()
    }

    pub fn octave(&self) -> u32 {
        self.octave.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::build_engine;
    use lutsynth_core::EngineConfig;

    #[test]
    fn test_initial_state() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        for id in OscId::ALL {
            assert_eq!(control.waveform(id), Waveform::Square);
            assert_eq!(control.phase_increments(id), (1.0, 1.0));
            assert!(!control.is_note_on(id));
            assert_eq!(control.wavetable(id), Wavetable::new(Waveform::Square, 0.5));
        }
        assert_eq!(control.master_amplitude(), 0.1);
        assert_eq!(control.octave(), 1);
        assert_eq!(control.elapsed_ms(), 0.0);
    }

    #[test]
    fn test_waveform_change_regenerates_mirror() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        control.set_waveform(OscId::B, Waveform::Triangle);
        control.set_pulse_width(OscId::B, 0.25);

        assert_eq!(control.wavetable(OscId::B), Wavetable::new(Waveform::Triangle, 0.25));
        assert_eq!(control.wavetable(OscId::A), Wavetable::new(Waveform::Square, 0.5));
    }

    #[test]
    fn test_pulse_width_on_sine_keeps_table() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        control.set_waveform(OscId::A, Waveform::Sine);
        control.set_pulse_width(OscId::A, 0.9);
        assert_eq!(control.pulse_width(OscId::A), 0.9);
        assert_eq!(control.wavetable(OscId::A), Wavetable::new(Waveform::Sine, 0.5));
    }

    #[test]
    fn test_octave_bounds() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        assert_eq!(control.octave_down(), 1);
        for _ in 0..10 {
            control.octave_up();
        }
        assert_eq!(control.octave(), 64);
        assert_eq!(control.octave_down(), 32);
        control.set_octave(1000);
        assert_eq!(control.octave(), 64);
        control.set_octave(0);
        assert_eq!(control.octave(), 1);
    }

    #[test]
    fn test_key_on_applies_octave() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        control.set_octave(4);
        assert!(control.key_on(OscId::C, 1.5));
        assert_eq!(control.phase_increments(OscId::C), (6.0, 6.0));
        assert!(control.is_note_on(OscId::C));

        // retrigger changes pitch only
        assert!(!control.key_on(OscId::C, 2.0));
        assert_eq!(control.phase_increments(OscId::C), (8.0, 8.0));

        control.key_off(OscId::C);
        assert!(!control.is_note_on(OscId::C));
    }

    #[test]
    fn test_set_frequency() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        control.set_frequency(OscId::A, 48_000.0 / TABLE_SIZE as f32);
        let (left, right) = control.phase_increments(OscId::A);
        assert!((left - 1.0).abs() < 1e-5);
        assert_eq!(left, right);
    }

    #[test]
    fn test_envelope_knobs() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        control.set_attack_ms(OscId::A, 250.0);
        control.set_decay_ms(OscId::A, 100.0);
        control.set_sustain_level(OscId::A, 0.5);
        control.set_release_ms(OscId::A, -1.0);

        let settings = control.envelope_settings(OscId::A);
        assert_eq!(settings.attack_ms, 250.0);
        assert_eq!(settings.decay_ms, 100.0);
        assert_eq!(settings.sustain_level, 0.5);
        assert_eq!(settings.release_ms, 0.01);
        assert_eq!(control.envelope_settings(OscId::B), EnvelopeConfig::default());
    }

    #[test]
    fn test_repeated_publish_without_mixer_does_not_leak_queue() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        for waveform in Waveform::ALL.iter().cycle().take(50) {
            control.set_waveform(OscId::A, *waveform);
        }
        assert_eq!(control.reclaim_retired_tables(), 0);
        assert_eq!(control.waveform(OscId::A), Waveform::Silence);
    }

    #[test]
    fn test_concurrent_octave_presses_are_not_lost() {
        let (control, _mixer) = build_engine(&EngineConfig::default());
        let control = Arc::new(control);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let control = Arc::clone(&control);
                std::thread::spawn(move || control.octave_up())
            })
            .collect();
        let mut seen: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.sort_unstable();

        assert_eq!(control.octave(), 16);
        assert_eq!(seen, vec![2, 4, 8, 16]);
    }

    #[test]
    fn test_non_finite_increments_are_zeroed() {
        let (control, mut mixer) = build_engine(&EngineConfig::default());
        control.set_phase_increments(OscId::A, f32::NAN, f32::INFINITY);
        assert_eq!(control.phase_increments(OscId::A), (0.0, 0.0));

        control.set_master_amplitude(1.0);
        control.key_on(OscId::B, f32::NAN);
        assert_eq!(control.phase_increments(OscId::B), (0.0, 0.0));

        let mut buffer = vec![0.0f32; 2 * 64];
        mixer.render(&mut buffer, 2, 64);
        assert!(buffer.iter().all(|s| s.is_finite()));
        assert_eq!(mixer.phases(OscId::A), (0.0, 0.0));
    }
}
