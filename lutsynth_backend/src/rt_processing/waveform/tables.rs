use std::f64::consts::PI;

use lutsynth_core::{TABLE_SIZE, Waveform};

/// Duty cycles closer than this to 0 or 1 are pulled in before generating a
/// triangle, so neither ramp divides by zero.
const MIN_TRIANGLE_DUTY: f32 = 1.0e-3;

/// One period of a waveform, `TABLE_SIZE` samples long.
///
/// Tables are filled on the control thread only. The audio thread reads them
/// through [`Wavetable::interpolate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Wavetable {
    samples: [f32; TABLE_SIZE],
}

impl Wavetable {
    /// An all-zero table
    pub fn silent() -> Self {
        Self {
            samples: [0.0; TABLE_SIZE],
        }
    }

    /// Build a table holding `waveform` with the given pulse width / duty cycle
    pub fn new(waveform: Waveform, pulse_width: f32) -> Self {
        let mut table = Self::silent();
        table.fill(waveform, pulse_width);
        table
    }

    /// Overwrite the table in place with a new waveform
    pub fn fill(&mut self, waveform: Waveform, pulse_width: f32) {
        match waveform {
            Waveform::Sawtooth => fill_sawtooth(&mut self.samples),
            Waveform::Sine => fill_sine(&mut self.samples),
            Waveform::Square => fill_square(&mut self.samples, pulse_width),
            Waveform::Triangle => fill_triangle(&mut self.samples, pulse_width),
            Waveform::Silence => self.samples.fill(0.0),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Linearly interpolated read at a fractional table index.
    ///
    /// Both neighbours wrap modulo the table length, so a phase past
    /// `TABLE_SIZE - 1` blends the last sample into the first.
    #[inline]
    pub fn interpolate(&self, phase: f32) -> f32 {
        let whole = phase.floor();
        let frac = phase - whole;
        let index = (whole as usize) % TABLE_SIZE;
        let next = if index + 1 == TABLE_SIZE { 0 } else { index + 1 };

        let a = self.samples[index];
        let b = self.samples[next];
        a + frac * (b - a)
    }
}

impl Default for Wavetable {
    fn default() -> Self {
        Self::new(Waveform::default(), 0.5)
    }
}

impl std::ops::Index<usize> for Wavetable {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.samples[index]
    }
}

pub fn fill_sine(table: &mut [f32]) {
    let len = table.len() as f64;
    for (i, sample) in table.iter_mut().enumerate() {
        *sample = (2.0 * PI * i as f64 / len).sin() as f32;
    }
}

/// Centered ramp: the wrap from +1 to -1 sits half a period in, so the table
/// starts at zero.
pub fn fill_sawtooth(table: &mut [f32]) {
    let len = table.len();
    for (i, sample) in table.iter_mut().enumerate() {
        *sample = 2.0 * ((i + len / 2) % len) as f32 / len as f32 - 1.0;
    }
}

/// +1 for the first `round(len * pulse_width)` samples, -1 after.
pub fn fill_square(table: &mut [f32], pulse_width: f32) {
    let high = high_samples(table.len(), pulse_width);
    let (up, down) = table.split_at_mut(high);
    up.fill(1.0);
    down.fill(-1.0);
}

/// Rises from -1 to +1 over the duty fraction, falls back to -1 over the rest.
pub fn fill_triangle(table: &mut [f32], duty: f32) {
    let duty = if duty.is_nan() { 0.5 } else { duty };
    let duty = duty.clamp(MIN_TRIANGLE_DUTY, 1.0 - MIN_TRIANGLE_DUTY) as f64;
    let len = table.len() as f64;
    let rise = len * duty;
    let fall = len - rise;

    for (i, sample) in table.iter_mut().enumerate() {
        let i = i as f64;
        let value = if i < rise {
            -1.0 + 2.0 * i / rise
        } else {
            1.0 - 2.0 * (i - rise) / fall
        };
        *sample = value as f32;
    }
}

/// Number of +1 samples in a square table of `len` samples
pub fn high_samples(len: usize, pulse_width: f32) -> usize {
    let pulse_width = if pulse_width.is_nan() { 0.5 } else { pulse_width.clamp(0.0, 1.0) };
    ((len as f32 * pulse_width).round() as usize).min(len)
}

/// Advance a phase accumulator by `increment`, keeping it in `[0, TABLE_SIZE)`.
///
/// The common case is one subtraction. Increments of a table length or more
/// (and negative ones) fall back to a Euclidean remainder.
#[inline]
pub fn advance_phase(phase: f32, increment: f32) -> f32 {
    const LEN: f32 = TABLE_SIZE as f32;
    let mut next = phase + increment;
    if next >= LEN {
        next -= LEN;
    }
    if !(0.0..LEN).contains(&next) {
        next = next.rem_euclid(LEN);
        // rem_euclid can round up to exactly LEN for tiny negative inputs
        if next >= LEN {
            next = 0.0;
        }
    }
    next
}
