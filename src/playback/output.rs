//! Audio output through the default cpal device.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{PlaybackClock, Transport};
use crate::audio::decode::AudioData;

/// Plays decoded mono samples; the clock is derived from frames handed to the device.
pub struct CpalTransport {
    device: cpal::Device,
    config: cpal::StreamConfig,
    samples: Arc<Vec<f32>>,
    source_rate: u32,
    frames_played: Arc<AtomicU64>,
    stream: RefCell<Option<cpal::Stream>>,
}

impl CpalTransport {
    pub fn load(audio: &AudioData) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let supported = device
            .default_output_config()
            .context("Failed to query output config")?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            bail!("Output device does not accept f32 samples ({:?})", supported.sample_format());
        }
        let config = supported.config();

        log::info!(
            "Audio output: {} @ {}Hz, {} channels",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            config.sample_rate.0,
            config.channels
        );
        if config.sample_rate.0 != audio.sample_rate {
            log::warn!(
                "Device runs at {}Hz, file at {}Hz; using nearest-sample rate conversion",
                config.sample_rate.0,
                audio.sample_rate
            );
        }

        Ok(Self {
            device,
            config,
            samples: Arc::new(audio.samples.clone()),
            source_rate: audio.sample_rate,
            frames_played: Arc::new(AtomicU64::new(0)),
            stream: RefCell::new(None),
        })
    }
}

impl PlaybackClock for CpalTransport {
    fn position_ms(&self) -> Option<f64> {
        self.stream.borrow().as_ref()?;
        let frames = self.frames_played.load(Ordering::Relaxed);
        Some(frames as f64 / self.config.sample_rate.0 as f64 * 1000.0)
    }
}

impl Transport for CpalTransport {
    fn play(&self) -> Result<()> {
        let channels = self.config.channels.max(1) as usize;
        let ratio = self.source_rate as f64 / self.config.sample_rate.0 as f64;
        let samples = Arc::clone(&self.samples);
        let played = Arc::clone(&self.frames_played);
        played.store(0, Ordering::Relaxed);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut frame = played.load(Ordering::Relaxed);
                    for out in data.chunks_mut(channels) {
                        let src = (frame as f64 * ratio) as usize;
                        out.fill(samples.get(src).copied().unwrap_or(0.0));
                        frame += 1;
                    }
                    played.store(frame, Ordering::Relaxed);
                },
                |err| log::error!("Audio output stream error: {}", err),
                None,
            )
            .context("Failed to build output stream")?;
        stream.play().context("Failed to start output stream")?;
        *self.stream.borrow_mut() = Some(stream);
        Ok(())
    }

    fn stop(&self) {
        if let Some(stream) = self.stream.borrow().as_ref() {
            if let Err(err) = stream.pause() {
                log::warn!("Failed to pause output stream: {}", err);
            }
        }
    }
}
