use std::sync::atomic::{AtomicU64, Ordering};

/// Logical time shared by the audio and control threads.
///
/// Time is counted in frames. The mixer claims each buffer's frames before
/// it snapshots parameters and renders, so a timestamp a control thread
/// reads is never earlier than a frame the mixer has started producing. A
/// key event therefore lands on the first frame of the next buffer.
#[derive(Debug)]
pub struct SampleClock {
    frames: AtomicU64,
    sample_rate: f32,
}

impl SampleClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate,
        }
    }

    /// Current time in frames
    #[inline]
    pub fn now(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Claim the next `frames` frames and return the first of them. Called
    /// from the audio thread only.
    #[inline]
    pub fn advance(&self, frames: u64) -> u64 {
        self.frames.fetch_add(frames, Ordering::AcqRel)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Convert a frame count to milliseconds at this clock's rate
    pub fn frames_to_ms(&self, frames: u64) -> f64 {
        frames as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Logical time elapsed since the engine was built, in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.frames_to_ms(self.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_monotonically() {
        let clock = SampleClock::new(48_000.0);
        assert_eq!(clock.now(), 0);
        clock.advance(512);
        clock.advance(512);
        assert_eq!(clock.now(), 1024);
    }

    #[test]
    fn test_elapsed_ms() {
        let clock = SampleClock::new(48_000.0);
        clock.advance(48_000);
        assert_eq!(clock.elapsed_ms(), 1000.0);
        assert_eq!(clock.frames_to_ms(48), 1.0);
    }

    #[test]
    fn test_advance_returns_start_of_claimed_span() {
        let clock = SampleClock::new(48_000.0);
        assert_eq!(clock.advance(512), 0);
        // readers already see the end of the span being rendered
        assert_eq!(clock.now(), 512);
        assert_eq!(clock.advance(256), 512);
        assert_eq!(clock.now(), 768);
    }
}
