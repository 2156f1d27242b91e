//! Audio loading and spectrogram featurization.

use crate::error::{AudioError, Result};
use hound::{SampleFormat, WavReader, WavSpec};
use ndarray::Array2;
use std::f32::consts::PI;
use std::path::Path;

/// Expected sample rate for training audio (16kHz)
pub const SAMPLE_RATE: u32 = 16000;

/// Power floor added before the log so silence stays finite.
pub const POWER_FLOOR: f32 = 1e-14;

/// Linear log-power spectrogram featurizer.
///
/// Produces a `[channels, frames]` matrix where each channel is one FFT
/// frequency bin up to `max_freq`. Every value is at least `ln(POWER_FLOOR)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spectrogram {
    /// Hop between consecutive windows in milliseconds
    pub stride_ms: f32,
    /// Analysis window length in milliseconds
    pub window_ms: f32,
    /// Highest frequency kept, in Hz
    pub max_freq: f32,
    pub sample_rate: u32,
}

impl Default for Spectrogram {
    fn default() -> Self {
        Self::DEEP_SPEECH
    }
}

impl Spectrogram {
    /// 20ms windows every 10ms up to 8kHz (161 channels at 16kHz).
    pub const DEEP_SPEECH: Self = Self {
        stride_ms: 10.0,
        window_ms: 20.0,
        max_freq: 8000.0,
        sample_rate: SAMPLE_RATE,
    };

    /// Window length in samples (also the FFT size).
    pub fn window_samples(&self) -> usize {
        (self.window_ms * self.sample_rate as f32 / 1000.0) as usize
    }

    /// Hop length in samples.
    pub fn hop_samples(&self) -> usize {
        (self.stride_ms * self.sample_rate as f32 / 1000.0) as usize
    }

    /// Number of feature channels (frequency bins up to `max_freq`).
    pub fn channels(&self) -> usize {
        let n_fft = self.window_samples();
        let bin_width = self.sample_rate as f32 / n_fft as f32;
        let max_bin = (self.max_freq / bin_width).floor() as usize;
        max_bin.min(n_fft / 2) + 1
    }

    /// Number of frames produced for `samples` audio samples.
    ///
    /// Audio shorter than one window is zero-padded to a single frame.
    pub fn num_frames(&self, samples: usize) -> usize {
        let window = self.window_samples();
        if samples <= window {
            1
        } else {
            (samples - window) / self.hop_samples() + 1
        }
    }

    /// Compute the log-power spectrogram of 16kHz mono audio.
    ///
    /// # Returns
    ///
    /// 2D array of features (channels, frames)
    pub fn apply(&self, audio: &[f32]) -> Array2<f32> {
        use rustfft::{FftPlanner, num_complex::Complex};

        let n_fft = self.window_samples();
        let hop = self.hop_samples();
        let channels = self.channels();
        let num_frames = self.num_frames(audio.len());

        let window = hann_window(n_fft);
        // Scale so the spectrum is a power spectral density
        let scale = window.iter().map(|w| w * w).sum::<f32>() * self.sample_rate as f32;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        let mut features = Array2::<f32>::zeros((channels, num_frames));
        let mut frame = vec![Complex::new(0.0, 0.0); n_fft];

        for frame_idx in 0..num_frames {
            let start = frame_idx * hop;
            let available = audio.len().saturating_sub(start).min(n_fft);

            frame.fill(Complex::new(0.0, 0.0));
            for i in 0..available {
                frame[i] = Complex::new(audio[start + i] * window[i], 0.0);
            }

            fft.process(&mut frame);

            for k in 0..channels {
                let magnitude = frame[k].norm();
                let mut power = magnitude * magnitude / scale;
                // One-sided spectrum: interior bins carry both halves
                if k != 0 && k != n_fft / 2 {
                    power *= 2.0;
                }
                features[[k, frame_idx]] = (power + POWER_FLOOR).ln();
            }
        }

        features
    }
}

/// Create Hann window for STFT.
fn hann_window(window_length: usize) -> Vec<f32> {
    (0..window_length)
        .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / (window_length as f32 - 1.0)).cos())
        .collect()
}

/// Load audio from a WAV file.
///
/// Returns audio samples and WAV specification.
pub fn load_audio<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, WavSpec)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<hound::Result<_>>()?,
        SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
            .collect::<hound::Result<_>>()?,
    };

    Ok((samples, spec))
}

/// Load audio from a WAV file as mono f32 samples at 16kHz.
///
/// # Errors
///
/// Returns error if:
/// - File cannot be read
/// - Sample rate is not 16kHz
/// - Channel count is invalid (0 or > 2)
pub fn read_audio_mono(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let (mut audio, spec) = load_audio(path)?;

    if spec.sample_rate != SAMPLE_RATE {
        return Err(AudioError::InvalidSampleRate {
            expected: SAMPLE_RATE,
            got: spec.sample_rate,
        }
        .into());
    }

    if spec.channels == 0 || spec.channels > 2 {
        return Err(AudioError::InvalidChannels(spec.channels).into());
    }

    if spec.channels == 2 {
        audio = audio
            .chunks(2)
            .map(|chunk| chunk.iter().sum::<f32>() / 2.0)
            .collect();
    }

    Ok(audio)
}
