use std::sync::Arc;

use log::info;
use lutsynth_core::{OSCILLATOR_COUNT, OscId};

use crate::engine::EngineShared;
use crate::rt_processing::callback::{AudioCallback, StreamControl};
use crate::rt_processing::waveform::{Oscillator, VoiceSnapshot, Wavetable};

/// Audio-thread half of the engine.
///
/// Sums every oscillator's enveloped, interpolated output into interleaved
/// stereo frames and advances their phases.
pub struct Mixer {
    shared: Arc<EngineShared>,
    oscillators: [Oscillator; OSCILLATOR_COUNT],
}

impl Mixer {
    pub(crate) fn new(shared: Arc<EngineShared>, tables: [Box<Wavetable>; OSCILLATOR_COUNT]) -> Self {
        let mut tables = tables.into_iter();
        let oscillators = OscId::ALL.map(|id| {
            let table = tables.next().unwrap_or_else(|| Box::new(Wavetable::silent()));
            Oscillator::new(id, table)
        });
        Self { shared, oscillators }
    }

    pub fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }

    pub fn oscillator(&self, id: OscId) -> &Oscillator {
        &self.oscillators[id.index()]
    }

    /// Current (left, right) phase of an oscillator
    pub fn phases(&self, id: OscId) -> (f32, f32) {
        self.oscillators[id.index()].phases()
    }

    /// Pick up any tables published since the last buffer.
    fn adopt_tables(&mut self) {
        for osc in &mut self.oscillators {
            let Some(table) = self.shared.oscillator(osc.id()).take_pending_table() else {
                continue;
            };
            let retired = osc.replace_table(table);
            // Only reachable if control threads stop reclaiming; dropping
            // here is the lesser evil.
            let _ = self.shared.retire_table(retired);
        }
    }

    /// Render `frames` interleaved frames into `output`.
    ///
    /// The frames are claimed on the shared clock before parameters are
    /// snapshotted, so control events stamped while this buffer renders apply
    /// from the start of the next one. Time is sampled once per frame and
    /// shared by both channels and every oscillator.
    pub fn render(&mut self, output: &mut [f32], channels: usize, frames: usize) {
        let channels = channels.max(1);
        let frames = frames.min(output.len() / channels);
        self.adopt_tables();

        let start = self.shared.clock().advance(frames as u64);
        let master = self.shared.master_amplitude();
        let voices: [VoiceSnapshot; OSCILLATOR_COUNT] =
            OscId::ALL.map(|id| self.shared.oscillator(id).snapshot());

        for (index, frame) in output.chunks_exact_mut(channels).take(frames).enumerate() {
            let now = start + index as u64;

            let mut left = 0.0f32;
            let mut right = 0.0f32;
            for (osc, voice) in self.oscillators.iter().zip(&voices) {
                let gain = voice.envelope.amplitude(now) * voice.amplitude;
                left += gain * osc.interpolate_left();
                right += gain * osc.interpolate_right();
            }
            write_frame(frame, master * left, master * right);

            for (osc, voice) in self.oscillators.iter_mut().zip(&voices) {
                osc.advance(voice.left_increment, voice.right_increment);
            }
        }
    }
}

#[inline]
fn write_frame(frame: &mut [f32], left: f32, right: f32) {
    match frame {
        [mono] => *mono = 0.5 * (left + right),
        [l, r, rest @ ..] => {
            *l = left;
            *r = right;
            rest.fill(0.0);
        }
        [] => {}
    }
}

impl AudioCallback for Mixer {
    fn process(
        &mut self,
        output: &mut [f32],
        _sample_rate: f32,
        channels: usize,
        frames: usize,
    ) -> StreamControl {
        self.render(output, channels, frames);
        StreamControl::Continue
    }

    fn stream_finished(&mut self) {
        info!("Stream Completed: {}", self.shared.status());
    }
}
