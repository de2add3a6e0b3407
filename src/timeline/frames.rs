use crate::audio::stft::Spectrogram;
use crate::error::{Result, SpiralError};
use crate::spiral::{map_frequency, PitchPoint, RadiusMode};

/// Display channels of one STFT hop, normalized against the whole signal.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSample {
    pub frame_index: usize,
    /// `1 - m / max`: 0 is the loudest bin of the file, 1 is silence.
    pub dim: Vec<f32>,
    /// `(m / max * 10)^2`: point area, up to 100.
    pub size: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct FrameTimeline {
    pub frames: Vec<FrameSample>,
    /// Banded-mode point of every bin, shared by all frames.
    pub bin_points: Vec<PitchPoint>,
    pub hop_ms: f64,
}

impl FrameTimeline {
    pub fn duration_ms(&self) -> f64 {
        self.frames.len() as f64 * self.hop_ms
    }

    /// Index of the frame covering `time_ms`; may be past the end.
    pub fn step_at(&self, time_ms: f64) -> usize {
        (time_ms.max(0.0) / self.hop_ms).floor() as usize
    }
}

pub fn hop_duration_ms(hop_size: usize, sample_rate: u32) -> Result<f64> {
    if sample_rate == 0 {
        return Err(SpiralError::invalid("sample rate must be > 0"));
    }
    if hop_size == 0 {
        return Err(SpiralError::invalid("hop size must be > 0"));
    }
    Ok(hop_size as f64 / sample_rate as f64 * 1000.0)
}

pub fn build_from_spectrogram(spectrogram: &Spectrogram, reference_hz: f64) -> Result<FrameTimeline> {
    let hop_ms = hop_duration_ms(spectrogram.hop_size, spectrogram.sample_rate)?;
    build(&spectrogram.frames, hop_ms, &spectrogram.bin_frequencies, reference_hz)
}

pub fn build(
    magnitudes: &[Vec<f32>],
    hop_ms: f64,
    bin_frequencies: &[f64],
    reference_hz: f64,
) -> Result<FrameTimeline> {
    if !hop_ms.is_finite() || hop_ms <= 0.0 {
        return Err(SpiralError::invalid(format!("hop duration must be > 0, got {}", hop_ms)));
    }
    if magnitudes.is_empty() {
        return Err(SpiralError::decode("spectrogram has no frames"));
    }
    let num_bins = bin_frequencies.len();
    if num_bins == 0 {
        return Err(SpiralError::decode("spectrogram has no bins"));
    }
    if let Some((i, frame)) = magnitudes.iter().enumerate().find(|(_, f)| f.len() != num_bins) {
        return Err(SpiralError::decode(format!(
            "frame {} has {} bins, expected {}",
            i,
            frame.len(),
            num_bins
        )));
    }

    let bin_points = bin_frequencies
        .iter()
        .map(|&f| map_frequency(f, reference_hz, RadiusMode::Banded))
        .collect::<Result<Vec<_>>>()?;

    let global_max = magnitudes.iter().flatten().copied().fold(0.0f32, f32::max);
    let norm = if global_max > 0.0 { global_max } else { 1.0 };

    let frames = magnitudes
        .iter()
        .enumerate()
        .map(|(frame_index, frame)| {
            let (dim, size) = frame
                .iter()
                .map(|&m| {
                    let level = m / norm;
                    (1.0 - level, (level * 10.0).powi(2))
                })
                .unzip();
            FrameSample {
                frame_index,
                dim,
                size,
            }
        })
        .collect::<Vec<_>>();

    log::info!(
        "Frame timeline: {} frames x {} bins, hop {:.2}ms, global max {:.4}",
        frames.len(),
        num_bins,
        hop_ms,
        global_max
    );

    Ok(FrameTimeline {
        frames,
        bin_points,
        hop_ms,
    })
}
