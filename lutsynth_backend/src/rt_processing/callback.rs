//! Lock-conscious realtime audio callback slot.
//!
//! Design goals:
//! - No OS mutex or syscall in the audio callback path.
//! - Never allocate inside the audio thread.
//! - If the processor is held by another thread, output silence instead of
//!   waiting for it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::rt_processing::performance::LoadMonitor;

/// What the backend should do after a callback returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    /// Keep requesting buffers.
    Continue,
    /// No more audio will be produced.
    Complete,
}

/// Trait every realtime processor must implement.
///
/// `process` runs on the audio thread and must not block or allocate.
pub trait AudioCallback: Send + 'static {
    /// Fill the interleaved `output` buffer (length == frames * channels).
    fn process(
        &mut self,
        output: &mut [f32],
        sample_rate: f32,
        channels: usize,
        frames: usize,
    ) -> StreamControl;

    /// One-shot notification that no further callbacks will occur.
    fn stream_finished(&mut self) {}
}

/// Holds a processor behind a `spin::Mutex` and exposes a realtime-safe
/// entry point for the backend.
///
/// The audio thread only ever `try_lock`s. Control threads may lock to swap
/// the processor or deliver the finish notification.
pub struct CallbackSlot {
    processor: Arc<Mutex<Box<dyn AudioCallback>>>,
    monitor: Arc<LoadMonitor>,
    sample_rate: f32,
    channels: usize,
    complete: AtomicBool,
    finished: AtomicBool,
}

impl CallbackSlot {
    pub fn new(
        processor: Box<dyn AudioCallback>,
        sample_rate: f32,
        channels: usize,
        monitor: Arc<LoadMonitor>,
    ) -> Self {
        Self {
            processor: Arc::new(Mutex::new(processor)),
            monitor,
            sample_rate,
            channels: channels.max(1),
            complete: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Replace the current processor. Spins until the audio thread lets go.
    pub fn swap_processor(&self, processor: Box<dyn AudioCallback>) {
        *self.processor.lock() = processor;
        self.complete.store(false, Ordering::Release);
    }

    /// Realtime-safe process entry called from the audio I/O callback.
    ///
    /// `output` is interleaved, `frames * channels` long. Performs no heap
    /// allocation.
    pub fn process_realtime(&self, output: &mut [f32]) -> StreamControl {
        let frames = output.len() / self.channels;
        if frames == 0 {
            return StreamControl::Continue;
        }

        let _timer = self.monitor.time_callback();

        if self.complete.load(Ordering::Acquire) {
            output.fill(0.0);
            return StreamControl::Complete;
        }

        let Some(mut guard) = self.processor.try_lock() else {
            // Held by a control thread; silence beats a late buffer.
            output.fill(0.0);
            self.monitor.record_silenced();
            return StreamControl::Continue;
        };

        let control = guard.process(output, self.sample_rate, self.channels, frames);
        self.monitor.record_frames(frames as u64);

        if control == StreamControl::Complete {
            self.complete.store(true, Ordering::Release);
        }
        control
    }

    /// Deliver the stream-finished notification. Only the first call reaches
    /// the processor.
    pub fn finish(&self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            self.processor.lock().stream_finished();
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn monitor(&self) -> &Arc<LoadMonitor> {
        &self.monitor
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Handle to the processor lock, for callers that need to hold it
    pub fn processor_handle(&self) -> Arc<Mutex<Box<dyn AudioCallback>>> {
        Arc::clone(&self.processor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct ConstantProcessor {
        value: f32,
        finished: Arc<AtomicUsize>,
    }

    impl AudioCallback for ConstantProcessor {
        fn process(&mut self, output: &mut [f32], _: f32, _: usize, _: usize) -> StreamControl {
            output.fill(self.value);
            StreamControl::Continue
        }

        fn stream_finished(&mut self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct OneShot;

    impl AudioCallback for OneShot {
        fn process(&mut self, output: &mut [f32], _: f32, _: usize, _: usize) -> StreamControl {
            output.fill(1.0);
            StreamControl::Complete
        }
    }

    fn slot_with(value: f32) -> (CallbackSlot, Arc<AtomicUsize>) {
        let finished = Arc::new(AtomicUsize::new(0));
        let processor = ConstantProcessor { value, finished: Arc::clone(&finished) };
        let monitor = Arc::new(LoadMonitor::new(4, 48_000.0, 0.1));
        (CallbackSlot::new(Box::new(processor), 48_000.0, 2, monitor), finished)
    }

    #[test]
    fn test_process_realtime_runs_processor() {
        let (slot, _) = slot_with(0.25);
        let mut buffer = [0.0f32; 8];
        assert_eq!(slot.process_realtime(&mut buffer), StreamControl::Continue);
        assert!(buffer.iter().all(|&s| s == 0.25));

        let snap = slot.monitor().snapshot();
        assert_eq!(snap.callbacks, 1);
        assert_eq!(snap.frames_rendered, 4);
    }

    #[test]
    fn test_contended_processor_yields_silence() {
        let (slot, _) = slot_with(0.25);
        let handle = slot.processor_handle();
        let _held = handle.lock();

        let mut buffer = [1.0f32; 8];
        assert_eq!(slot.process_realtime(&mut buffer), StreamControl::Continue);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert_eq!(slot.monitor().snapshot().silenced_callbacks, 1);
    }

    #[test]
    fn test_finish_is_one_shot() {
        let (slot, finished) = slot_with(0.0);
        slot.finish();
        slot.finish();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_complete_processor_stays_silent() {
        let monitor = Arc::new(LoadMonitor::new(4, 48_000.0, 0.1));
        let slot = CallbackSlot::new(Box::new(OneShot), 48_000.0, 2, monitor);

        let mut buffer = [0.0f32; 8];
        assert_eq!(slot.process_realtime(&mut buffer), StreamControl::Complete);
        assert!(slot.is_complete());

        let mut buffer = [0.5f32; 8];
        assert_eq!(slot.process_realtime(&mut buffer), StreamControl::Complete);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_swap_processor() {
        let (slot, _) = slot_with(0.25);
        let finished = Arc::new(AtomicUsize::new(0));
        slot.swap_processor(Box::new(ConstantProcessor { value: -0.5, finished }));

        let mut buffer = [0.0f32; 4];
        slot.process_realtime(&mut buffer);
        assert!(buffer.iter().all(|&s| s == -0.5));
    }
}
