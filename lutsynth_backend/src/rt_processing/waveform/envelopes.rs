use crossbeam::atomic::AtomicCell;
use lutsynth_core::EnvelopeConfig;

/// Release times are floored at this many milliseconds.
pub const MIN_RELEASE_MS: f32 = 0.01;

/// Amplitudes smaller than this are reported as exactly zero.
pub const SILENCE_THRESHOLD: f32 = 1.0e-4;

// Packed state layout: the top two bits hold the tag. A sounding note keeps
// its 62-bit on-stamp below the tag; a releasing note keeps a 46-bit off-stamp
// above a 16-bit key-off level.
const TAG_SHIFT: u32 = 62;
const TAG_SOUNDING: u64 = 1;
const TAG_RELEASING: u64 = 2;
const PAYLOAD_MASK: u64 = (1 << TAG_SHIFT) - 1;
const LEVEL_BITS: u32 = 16;
const LEVEL_MASK: u64 = (1 << LEVEL_BITS) - 1;
const LEVEL_SCALE: f32 = u16::MAX as f32;

/// Release stamps keep this many low bits of the frame counter.
pub const RELEASE_STAMP_BITS: u32 = TAG_SHIFT - LEVEL_BITS;
const RELEASE_STAMP_MASK: u64 = (1 << RELEASE_STAMP_BITS) - 1;

/// Where an envelope is in a note's lifetime. Timestamps are in frames of the
/// shared sample clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeState {
    #[default]
    Idle,
    /// Note held since `on`. Attack, decay and sustain are derived from the
    /// elapsed time rather than stored.
    Sounding { on: u64 },
    /// Note released at `off` (low [`RELEASE_STAMP_BITS`] bits), ramping down
    /// from the amplitude it had then, stored as a 16-bit fraction of full
    /// scale.
    Releasing { off: u64, keyoff_level: u16 },
}

impl EnvelopeState {
    /// Released at `off` from amplitude `keyoff`
    pub fn releasing(off: u64, keyoff: f32) -> Self {
        let level = (keyoff.clamp(0.0, 1.0) * LEVEL_SCALE).round() as u16;
        EnvelopeState::Releasing {
            off: off & RELEASE_STAMP_MASK,
            keyoff_level: level,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, EnvelopeState::Sounding { .. })
    }

    /// Amplitude captured at key-off, if releasing
    pub fn keyoff_amplitude(&self) -> Option<f32> {
        match self {
            EnvelopeState::Releasing { keyoff_level, .. } => {
                Some(f32::from(*keyoff_level) / LEVEL_SCALE)
            }
            _ => None,
        }
    }

    fn pack(self) -> u64 {
        match self {
            EnvelopeState::Idle => 0,
            EnvelopeState::Sounding { on } => (TAG_SOUNDING << TAG_SHIFT) | (on & PAYLOAD_MASK),
            EnvelopeState::Releasing { off, keyoff_level } => {
                (TAG_RELEASING << TAG_SHIFT)
                    | ((off & RELEASE_STAMP_MASK) << LEVEL_BITS)
                    | u64::from(keyoff_level)
            }
        }
    }

    fn unpack(bits: u64) -> Self {
        let payload = bits & PAYLOAD_MASK;
        match bits >> TAG_SHIFT {
            TAG_SOUNDING => EnvelopeState::Sounding { on: payload },
            TAG_RELEASING => EnvelopeState::Releasing {
                off: payload >> LEVEL_BITS,
                keyoff_level: (payload & LEVEL_MASK) as u16,
            },
            _ => EnvelopeState::Idle,
        }
    }
}

/// ADSR (Attack, Decay, Sustain, Release) envelope shared between threads.
///
/// Knobs are independent atomic cells. The state is packed into one `u64`
/// cell changed by compare-and-swap, so a reader never sees a timestamp from
/// one transition paired with the lock from another, and the audio thread's
/// load is a plain atomic read.
#[derive(Debug)]
pub struct AdsrEnvelope {
    // Timing parameters (in milliseconds)
    attack_ms: AtomicCell<f32>,
    decay_ms: AtomicCell<f32>,
    sustain_level: AtomicCell<f32>,
    release_ms: AtomicCell<f32>,

    /// [`EnvelopeState`] packed by `EnvelopeState::pack`
    state: AtomicCell<u64>,
    sample_rate: f32,
}

impl AdsrEnvelope {
    pub fn new(sample_rate: f32, config: &EnvelopeConfig) -> Self {
        let envelope = Self {
            attack_ms: AtomicCell::new(0.0),
            decay_ms: AtomicCell::new(0.0),
            sustain_level: AtomicCell::new(1.0),
            release_ms: AtomicCell::new(MIN_RELEASE_MS),
            state: AtomicCell::new(EnvelopeState::Idle.pack()),
            sample_rate,
        };
        envelope.configure(config);
        envelope
    }

    /// Start a note at `now`.
    ///
    /// Returns `false` without touching the timing if a note is already
    /// sounding; only a key-off clears that lock.
    pub fn key_on(&self, now: u64) -> bool {
        let sounding = EnvelopeState::Sounding { on: now }.pack();
        let mut current = self.state.load();
        loop {
            if EnvelopeState::unpack(current).is_note_on() {
                return false;
            }
            match self.state.compare_exchange(current, sounding) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Release the note at `now`, capturing the amplitude it has at that moment
    pub fn key_off(&self, now: u64) {
        let mut current = self.state.load();
        loop {
            let keyoff = self.snapshot_of(EnvelopeState::unpack(current)).amplitude(now);
            let released = EnvelopeState::releasing(now, keyoff).pack();
            match self.state.compare_exchange(current, released) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current amplitude at `now`
    pub fn amplitude(&self, now: u64) -> f32 {
        self.snapshot().amplitude(now)
    }

    /// Copy of the knobs and state for evaluating many frames without
    /// touching the shared cells again.
    pub fn snapshot(&self) -> EnvelopeSnapshot {
        self.snapshot_of(self.state())
    }

    fn snapshot_of(&self, state: EnvelopeState) -> EnvelopeSnapshot {
        EnvelopeSnapshot {
            attack_ms: self.attack_ms.load(),
            decay_ms: self.decay_ms.load(),
            sustain_level: self.sustain_level.load(),
            release_ms: self.release_ms.load(),
            state,
            ms_per_frame: 1000.0 / self.sample_rate as f64,
        }
    }

    pub fn state(&self) -> EnvelopeState {
        EnvelopeState::unpack(self.state.load())
    }

    pub fn is_note_on(&self) -> bool {
        self.state().is_note_on()
    }

    /// Whether the audio thread's reads of this envelope avoid crossbeam's
    /// fallback lock. True on every target with 64-bit atomics.
    pub fn is_lock_free() -> bool {
        AtomicCell::<u64>::is_lock_free() && AtomicCell::<f32>::is_lock_free()
    }

    // Setters for runtime modification. Out-of-range input is coerced rather
    // than rejected.

    pub fn configure(&self, config: &EnvelopeConfig) {
        self.set_attack_ms(config.attack_ms);
        self.set_decay_ms(config.decay_ms);
        self.set_sustain_level(config.sustain_level);
        self.set_release_ms(config.release_ms);
    }

    pub fn set_attack_ms(&self, attack_ms: f32) {
        self.attack_ms.store(attack_ms.max(0.0));
    }

    pub fn set_decay_ms(&self, decay_ms: f32) {
        self.decay_ms.store(decay_ms.max(0.0));
    }

    pub fn set_sustain_level(&self, sustain_level: f32) {
        self.sustain_level.store(sustain_level.clamp(0.0, 1.0));
    }

    pub fn set_release_ms(&self, release_ms: f32) {
        self.release_ms.store(release_ms.max(MIN_RELEASE_MS));
    }

    // Getters
    pub fn attack_ms(&self) -> f32 { self.attack_ms.load() }
    pub fn decay_ms(&self) -> f32 { self.decay_ms.load() }
    pub fn sustain_level(&self) -> f32 { self.sustain_level.load() }
    pub fn release_ms(&self) -> f32 { self.release_ms.load() }

    pub fn settings(&self) -> EnvelopeConfig {
        EnvelopeConfig {
            attack_ms: self.attack_ms(),
            decay_ms: self.decay_ms(),
            sustain_level: self.sustain_level(),
            release_ms: self.release_ms(),
        }
    }
}

/// Plain-data view of an envelope, evaluated without atomics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeSnapshot {
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub sustain_level: f32,
    pub release_ms: f32,
    pub state: EnvelopeState,
    ms_per_frame: f64,
}

impl EnvelopeSnapshot {
    /// Amplitude at `now` (frames)
    #[inline]
    pub fn amplitude(&self, now: u64) -> f32 {
        let amplitude = match self.state {
            EnvelopeState::Idle => 0.0,
            EnvelopeState::Sounding { on } => {
                self.held_level(self.frames_to_ms(now.saturating_sub(on)))
            }
            EnvelopeState::Releasing { off, keyoff_level } => {
                let keyoff = f32::from(keyoff_level) / LEVEL_SCALE;
                let release = self.release_ms.max(MIN_RELEASE_MS);
                let progress = (self.frames_to_ms(release_elapsed(off, now)) / release).min(1.0);
                keyoff - keyoff * progress
            }
        };

        if amplitude.abs() < SILENCE_THRESHOLD {
            0.0
        } else {
            amplitude
        }
    }

    /// True once a released note has decayed to silence (or never started)
    pub fn is_finished(&self, now: u64) -> bool {
        !self.state.is_note_on() && self.amplitude(now) == 0.0
    }

    #[inline]
    fn frames_to_ms(&self, frames: u64) -> f32 {
        (frames as f64 * self.ms_per_frame) as f32
    }

    #[inline]
    fn held_level(&self, t: f32) -> f32 {
        let attack = self.attack_ms.max(0.0);
        let decay = self.decay_ms.max(0.0);

        if t <= attack {
            if attack > 0.0 { t / attack } else { 1.0 }
        } else if t < attack + decay {
            ((t - attack) / decay) * (self.sustain_level - 1.0) + 1.0
        } else {
            self.sustain_level
        }
    }
}

/// Frames from a truncated release stamp to `now`. A stamp that reads as
/// being in the future counts as zero elapsed.
#[inline]
fn release_elapsed(off: u64, now: u64) -> u64 {
    let elapsed = now.wrapping_sub(off) & RELEASE_STAMP_MASK;
    if elapsed > RELEASE_STAMP_MASK / 2 { 0 } else { elapsed }
}
