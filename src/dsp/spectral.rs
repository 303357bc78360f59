//! Short-time Fourier transform helpers shared by noise reduction and pitch
//! shifting.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Analysis frame length in samples
pub(crate) const FFT_SIZE: usize = 2048;

/// Analysis hop (75% overlap)
pub(crate) const HOP_SIZE: usize = FFT_SIZE / 4;

/// Periodic Hann window
pub(crate) fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

/// Wrap a phase value into [-PI, PI]
#[inline]
pub(crate) fn wrap_phase(phase: f32) -> f32 {
    let two_pi = 2.0 * PI;
    phase - two_pi * ((phase + PI) / two_pi).floor()
}

/// Windowed forward/inverse FFT pair of a fixed size
pub(crate) struct Stft {
    size: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub(crate) fn new(size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            size,
            window: hann_window(size),
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Window `frame` (zero-padded when short) and return its spectrum
    pub(crate) fn analyze(&self, frame: &[f32]) -> Vec<Complex<f32>> {
        let mut bins: Vec<Complex<f32>> = (0..self.size)
            .map(|i| Complex::new(frame.get(i).copied().unwrap_or(0.0) * self.window[i], 0.0))
            .collect();
        self.forward.process(&mut bins);
        bins
    }

    /// Inverse transform `bins` and apply the synthesis window
    pub(crate) fn synthesize(&self, mut bins: Vec<Complex<f32>>) -> Vec<f32> {
        self.inverse.process(&mut bins);
        let scale = 1.0 / self.size as f32;
        bins.iter()
            .zip(&self.window)
            .map(|(c, w)| c.re * scale * w)
            .collect()
    }
}

/// Weighted overlap-add accumulator
///
/// Frames are summed and the squared synthesis window is tracked per sample so
/// the result can be normalised for any hop size.
pub(crate) struct OverlapAdd {
    output: Vec<f32>,
    weight: Vec<f32>,
    window_sq: Vec<f32>,
}

impl OverlapAdd {
    pub(crate) fn new(len: usize, window_size: usize) -> Self {
        Self {
            output: vec![0.0; len],
            weight: vec![0.0; len],
            window_sq: hann_window(window_size).iter().map(|w| w * w).collect(),
        }
    }

    pub(crate) fn add(&mut self, offset: usize, frame: &[f32]) {
        for (i, (&sample, &w2)) in frame.iter().zip(&self.window_sq).enumerate() {
            let pos = offset + i;
            if pos >= self.output.len() {
                break;
            }
            self.output[pos] += sample;
            self.weight[pos] += w2;
        }
    }

    pub(crate) fn finish(self) -> Vec<f32> {
        self.output
            .into_iter()
            .zip(self.weight)
            .map(|(s, w)| if w > 1e-6 { s / w } else { 0.0 })
            .collect()
    }
}
