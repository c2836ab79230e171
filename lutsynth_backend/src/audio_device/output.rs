//! Default-device output stream feeding a [`CallbackSlot`].

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};
use log::{error, info, warn};
use thiserror::Error;

use crate::rt_processing::callback::{CallbackSlot, StreamControl};

/// Interleaved stereo, 32-bit float.
pub const OUTPUT_CHANNELS: u16 = 2;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("no default output device available")]
    NoOutputDevice,
    #[error("failed to open output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("failed to stop output stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
    #[error("output stream is not open")]
    NotOpen,
}

/// Owns the platform stream and the slot it pulls audio from.
pub struct OutputHost {
    stream: Option<Stream>,
    slot: Arc<CallbackSlot>,
    device_name: String,
}

impl OutputHost {
    /// Open a stereo float stream on the default output device.
    ///
    /// The stream is created paused; call [`OutputHost::start`] to begin
    /// pulling buffers.
    pub fn open(
        slot: Arc<CallbackSlot>,
        sample_rate: u32,
        buffer_frames: u32,
    ) -> Result<Self, StreamError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(StreamError::NoOutputDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown device".to_string());

        let config = StreamConfig {
            channels: OUTPUT_CHANNELS,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Fixed(buffer_frames),
        };

        let rt_slot = Arc::clone(&slot);
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if rt_slot.process_realtime(data) == StreamControl::Complete {
                    data.fill(0.0);
                }
            },
            |err| {
                error!("output stream error: {err}");
            },
            None,
        )?;

        info!(
            "opened \"{device_name}\": {} Hz, {} channels, {} frames per buffer",
            sample_rate, OUTPUT_CHANNELS, buffer_frames
        );

        Ok(Self {
            stream: Some(stream),
            slot,
            device_name,
        })
    }

    pub fn start(&self) -> Result<(), StreamError> {
        let stream = self.stream.as_ref().ok_or(StreamError::NotOpen)?;
        stream.play()?;
        info!("stream started");
        Ok(())
    }

    /// Pause the stream and deliver the finished notification to the
    /// processor.
    pub fn stop(&self) -> Result<(), StreamError> {
        let stream = self.stream.as_ref().ok_or(StreamError::NotOpen)?;
        stream.pause()?;
        self.slot.finish();
        Ok(())
    }

    /// Release the platform stream. Stopping first is the caller's job;
    /// closing a running stream still notifies the processor.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            self.slot.finish();
            info!("stream closed");
        } else {
            warn!("close called on a stream that is already closed");
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn slot(&self) -> &Arc<CallbackSlot> {
        &self.slot
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for OutputHost {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.close();
        }
    }
}
