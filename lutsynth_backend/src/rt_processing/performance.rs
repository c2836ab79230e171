use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quanta::{Clock, Instant as QuantaInstant};

/// Callback timing statistics, read off the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSnapshot {
    /// Frames rendered since creation or the last reset.
    pub frames_rendered: u64,
    /// Callback invocations.
    pub callbacks: u64,
    /// Callbacks that output silence because the processor was held elsewhere.
    pub silenced_callbacks: u64,
    /// Fastest callback observed (ns).
    pub min_callback_nanos: Option<u64>,
    /// Slowest callback observed (ns).
    pub max_callback_nanos: Option<u64>,
    /// Moving average of callback duration (ns).
    pub ema_callback_nanos: f64,
    /// Time budget of one buffer at the configured size and rate (ns).
    pub budget_nanos: f64,
}

impl LoadSnapshot {
    /// Average callback duration as a percentage of one buffer's budget
    pub fn load_percent(&self) -> f64 {
        if self.budget_nanos > 0.0 {
            self.ema_callback_nanos / self.budget_nanos * 100.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for LoadSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} callbacks, {} frames, {} silenced, avg load {:.1}%, peak {} us",
            self.callbacks,
            self.frames_rendered,
            self.silenced_callbacks,
            self.load_percent(),
            self.max_callback_nanos.unwrap_or(0) / 1_000,
        )
    }
}

/// Real-time-safe callback load monitor.
///
/// The `record_*` methods and [`LoadMonitor::time_callback`] touch atomics
/// only and may be called from the audio thread. [`LoadMonitor::snapshot`]
/// is for control threads.
pub struct LoadMonitor {
    clock: Clock,
    budget_nanos: f64,

    frames_rendered: AtomicU64,
    callbacks: AtomicU64,
    silenced_callbacks: AtomicU64,

    min_callback_nanos: AtomicU64,
    max_callback_nanos: AtomicU64,
    /// f64 bits
    ema_callback_bits: AtomicU64,
    ema_alpha: f64,
}

impl LoadMonitor {
    /// `ema_alpha` in (0, 1] sets how quickly the moving average follows new
    /// measurements; values outside that range fall back to 0.1.
    pub fn new(buffer_frames: usize, sample_rate: f32, ema_alpha: f64) -> Self {
        let ema_alpha = if ema_alpha > 0.0 && ema_alpha <= 1.0 { ema_alpha } else { 0.1 };
        let budget_nanos = if sample_rate > 0.0 {
            buffer_frames as f64 / sample_rate as f64 * 1_000_000_000.0
        } else {
            0.0
        };

        Self {
            clock: Clock::new(),
            budget_nanos,
            frames_rendered: AtomicU64::new(0),
            callbacks: AtomicU64::new(0),
            silenced_callbacks: AtomicU64::new(0),
            min_callback_nanos: AtomicU64::new(u64::MAX),
            max_callback_nanos: AtomicU64::new(0),
            ema_callback_bits: AtomicU64::new(0),
            ema_alpha,
        }
    }

    // ---------------------------
    // Audio-thread operations
    // ---------------------------

    #[inline(always)]
    pub fn record_frames(&self, frames: u64) {
        self.frames_rendered.fetch_add(frames, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_silenced(&self) {
        self.silenced_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one callback duration into min, max and the moving average
    #[inline(always)]
    pub fn record_duration(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        self.min_callback_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_callback_nanos.fetch_max(nanos, Ordering::Relaxed);

        let alpha = self.ema_alpha;
        let _ = self
            .ema_callback_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let old = f64::from_bits(bits);
                let new = if old == 0.0 {
                    nanos as f64
                } else {
                    alpha * nanos as f64 + (1.0 - alpha) * old
                };
                Some(new.to_bits())
            });
    }

    /// Count a callback and time it until the returned guard drops
    #[inline(always)]
    pub fn time_callback(&self) -> CallbackTimer<'_> {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        CallbackTimer {
            monitor: self,
            start: self.clock.now(),
        }
    }

    // ---------------------------
    // Control-thread operations
    // ---------------------------

    pub fn snapshot(&self) -> LoadSnapshot {
        let min_raw = self.min_callback_nanos.load(Ordering::Relaxed);
        let max_raw = self.max_callback_nanos.load(Ordering::Relaxed);

        LoadSnapshot {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            callbacks: self.callbacks.load(Ordering::Relaxed),
            silenced_callbacks: self.silenced_callbacks.load(Ordering::Relaxed),
            min_callback_nanos: (min_raw != u64::MAX).then_some(min_raw),
            max_callback_nanos: (max_raw != 0).then_some(max_raw),
            ema_callback_nanos: f64::from_bits(self.ema_callback_bits.load(Ordering::Relaxed)),
            budget_nanos: self.budget_nanos,
        }
    }

    pub fn reset(&self) {
        self.frames_rendered.store(0, Ordering::Relaxed);
        self.callbacks.store(0, Ordering::Relaxed);
        self.silenced_callbacks.store(0, Ordering::Relaxed);
        self.min_callback_nanos.store(u64::MAX, Ordering::Relaxed);
        self.max_callback_nanos.store(0, Ordering::Relaxed);
        self.ema_callback_bits.store(0, Ordering::Relaxed);
    }
}

/// Records the time between its creation and drop on the monitor
pub struct CallbackTimer<'a> {
    monitor: &'a LoadMonitor,
    start: QuantaInstant,
}

impl Drop for CallbackTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.monitor.clock.now().saturating_duration_since(self.start);
        self.monitor.record_duration(elapsed);
    }
}
