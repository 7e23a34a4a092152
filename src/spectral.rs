//! # Spectral pitch estimator
//!
//! ## Acronyms used:
//!
//! - `FFT`: Fast Fourier Transform
//! - `DC`:  the zero frequency component of a signal
//!
//! The spectral tracker listens to an audio rate signal and estimates its pitch as the frequency of the strongest FFT
//! bin. A block of raw ADC samples has its DC component removed, is optionally filtered and windowed, and then goes
//! through a real-to-complex FFT. The power of every bin below Nyquist is compared and the winner is converted back to
//! a frequency.
//!
//! The frequency resolution is `sample_rate / N`, so with the default 8kHz sample rate and 2048 sample blocks each bin
//! is about 3.9Hz wide. That is coarse for low notes, which is why the result is snapped DOWN onto the note table
//! rather than trusted as-is.
//!
//! The strongest bin is not always the fundamental, bright signals can have harmonics louder than the fundamental.
//! An optional lowpass pre-filter can be used to tame harmonics above the highest note of interest.

use std::sync::Arc;

use biquad::*;
use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{error::ConfigError, utils::mean_of_codes};

/// Window functions applied to each block before the FFT are represented here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// No window, the block is used as captured
    Rectangular,

    /// Raised cosine window, less leakage between bins at the cost of a wider peak
    Hann,
}

/// The strongest bin of a spectrum is represented here
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectralPeak {
    /// The index of the bin, in `[0, N/2)`
    pub bin: usize,

    /// The frequency at the start of the bin, in Hertz
    pub frequency_hz: f32,

    /// The power of the bin, `re^2 + im^2`
    pub power: f32,
}

/// An FFT based pitch estimator for blocks of `N` samples is represented here.
pub struct SpectralPitchEstimator<const N: usize> {
    sample_rate_hz: f32,

    window: Vec<f32>,

    // coefficients for the optional lowpass pre-filter, a fresh filter runs over each block
    prefilter: Option<Coefficients<f32>>,

    fft: Arc<dyn RealToComplex<f32>>,

    // working buffers, allocated once up front
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl<const N: usize> SpectralPitchEstimator<N> {
    /// `SpectralPitchEstimator::new(sr)` is a new estimator for blocks sampled at `sr` Hertz, with no window and no
    /// pre-filter
    pub fn new(sample_rate_hz: f32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(N);

        Self {
            sample_rate_hz,
            window: vec![1.0_f32; N],
            prefilter: None,
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
        }
    }

    /// `est.with_window(w)` is the estimator using window function `w`
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = match window {
            Window::Rectangular => vec![1.0_f32; N],
            Window::Hann => (0..N).map(|i| hann(i, N)).collect(),
        };
        self
    }

    /// `est.with_prefilter(fc)` is the estimator with a 2-pole Butterworth lowpass at `fc` Hertz ahead of the FFT
    ///
    /// # Errors
    ///
    /// The cutoff must be above zero and below the Nyquist frequency.
    pub fn with_prefilter(mut self, cutoff_hz: f32) -> Result<Self, ConfigError> {
        let nyquist = self.sample_rate_hz / 2.0_f32;
        if !(0.0_f32 < cutoff_hz && cutoff_hz < nyquist) {
            return Err(ConfigError::PrefilterCutoff(cutoff_hz));
        }

        let coeffs = Coefficients::<f32>::from_params(
            Type::LowPass,
            self.sample_rate_hz.hz(),
            cutoff_hz.hz(),
            Q_BUTTERWORTH_F32,
        )
        .map_err(|_| ConfigError::PrefilterCutoff(cutoff_hz))?;

        self.prefilter = Some(coeffs);
        Ok(self)
    }

    /// `est.estimate(buf)` is the frequency in Hertz of the strongest spectral component of the samples in `buf`
    ///
    /// A silent or constant block has no power anywhere and estimates to zero Hertz.
    pub fn estimate(&mut self, buffer: &[u16]) -> f32 {
        self.find_peak(buffer).frequency_hz
    }

    /// `est.find_peak(buf)` is the strongest bin below Nyquist of the spectrum of the samples in `buf`
    ///
    /// Blocks shorter than `N` are zero padded, extra samples past `N` are ignored.
    pub fn find_peak(&mut self, buffer: &[u16]) -> SpectralPeak {
        let block = &buffer[..buffer.len().min(N)];
        let dc = mean_of_codes(block);

        self.input.iter_mut().for_each(|x| *x = 0.0_f32);
        for (x, code) in self.input.iter_mut().zip(block) {
            *x = *code as f32 - dc;
        }

        if let Some(coeffs) = self.prefilter {
            let mut lpf = DirectForm1::<f32>::new(coeffs);
            self.input.iter_mut().for_each(|x| *x = lpf.run(*x));
        }

        for (x, w) in self.input.iter_mut().zip(&self.window) {
            *x *= w;
        }

        if let Err(e) = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            // only possible if the working buffers were sized wrong
            log::error!("FFT failed: {e}");
            return SpectralPeak::default();
        }

        // any bin at or above N/2 is aliased, so it can't be trusted
        let mut peak = SpectralPeak::default();
        for (bin, c) in self.spectrum.iter().enumerate().take(N / 2) {
            let power = c.re * c.re + c.im * c.im;
            if peak.power < power {
                peak.bin = bin;
                peak.power = power;
            }
        }
        peak.frequency_hz = self.bin_to_frequency(peak.bin);

        peak
    }

    /// `est.bin_to_frequency(k)` is the frequency in Hertz of FFT bin `k`
    pub fn bin_to_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate_hz / N as f32
    }

    /// `est.resolution_hz()` is the width of each FFT bin in Hertz
    pub fn resolution_hz(&self) -> f32 {
        self.bin_to_frequency(1)
    }
}

/// `hann(i, n)` is sample `i` of an `n` point Hann window
fn hann(i: usize, n: usize) -> f32 {
    if n < 2 {
        return 1.0_f32;
    }
    let phase = 2.0_f32 * core::f32::consts::PI * i as f32 / (n - 1) as f32;
    0.5_f32 * (1.0_f32 - libm::cosf(phase))
}
