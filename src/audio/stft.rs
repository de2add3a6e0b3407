use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::decode::AudioData;
use crate::error::{Result, SpiralError};

pub const DEFAULT_N_FFT: usize = 2048;
pub const DEFAULT_HOP: usize = 2048;

/// Magnitude spectrogram, frame-major, with the DC bin dropped.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    /// Centre frequency of each retained bin, `k * sr / n_fft` for `k = 1..=n_fft/2`.
    pub bin_frequencies: Vec<f64>,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn num_bins(&self) -> usize {
        self.bin_frequencies.len()
    }
}

/// Centred STFT: the signal is zero-padded by `n_fft / 2` on both sides, so
/// frame `i` is centred on sample `i * hop` and there are `1 + len / hop` frames.
pub fn stft(audio: &AudioData, n_fft: usize, hop: usize) -> Result<Spectrogram> {
    if n_fft < 2 {
        return Err(SpiralError::invalid(format!("n_fft must be >= 2, got {}", n_fft)));
    }
    if hop == 0 {
        return Err(SpiralError::invalid("hop size must be > 0"));
    }
    if audio.sample_rate == 0 {
        return Err(SpiralError::invalid("sample rate must be > 0"));
    }
    if audio.samples.is_empty() {
        return Err(SpiralError::decode("empty signal"));
    }

    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; audio.samples.len() + 2 * pad];
    padded[pad..pad + audio.samples.len()].copy_from_slice(&audio.samples);

    let num_frames = 1 + audio.samples.len() / hop;
    let half = n_fft / 2;
    let window = hann_window(n_fft);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);

    log::info!(
        "STFT: {} frames, n_fft={}, hop={} ({:.1}ms)",
        num_frames,
        n_fft,
        hop,
        hop as f64 / audio.sample_rate as f64 * 1000.0
    );

    let frames: Vec<Vec<f32>> = (0..num_frames)
        .into_par_iter()
        .map(|i| {
            let start = i * hop;
            let mut buffer: Vec<Complex<f32>> = (0..n_fft)
                .map(|j| {
                    let s = padded.get(start + j).copied().unwrap_or(0.0);
                    Complex::new(s * window[j], 0.0)
                })
                .collect();
            fft.process(&mut buffer);
            buffer[1..=half].iter().map(|c| c.norm()).collect()
        })
        .collect();

    let bin_hz = audio.sample_rate as f64 / n_fft as f64;
    let bin_frequencies = (1..=half).map(|k| k as f64 * bin_hz).collect();

    Ok(Spectrogram {
        frames,
        bin_frequencies,
        hop_size: hop,
        sample_rate: audio.sample_rate,
    })
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}
