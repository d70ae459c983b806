//! Biquad band-split filters (RBJ Audio EQ Cookbook coefficients).

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Bandpass,
    Highpass,
}

impl FilterType {
    /// Q used for each band shape.
    pub fn default_q(self) -> f64 {
        match self {
            FilterType::Bandpass => 1.0,
            FilterType::Lowpass | FilterType::Highpass => FRAC_1_SQRT_2,
        }
    }
}

/// A biquad IIR filter (2nd order).
///
/// Direct Form II Transposed, with coefficients and state kept in `f64`.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: FilterType,
    frequency: f64,
    q: f64,

    // Coefficients
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed)
    z1: f64,
    z2: f64,

    sample_rate: f64,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, sample_rate: f64, frequency: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency: 0.0,
            q: filter_type.default_q(),
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.frequency = f.clamp_frequency(frequency);
        f.update_coefficients();
        f
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Effective cutoff / center frequency after clamping.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Set the cutoff; coefficients are only recomputed when it changes.
    pub fn set_frequency(&mut self, freq: f64) {
        let freq = self.clamp_frequency(freq);
        if freq != self.frequency {
            self.frequency = freq;
            self.update_coefficients();
        }
    }

    fn clamp_frequency(&self, freq: f64) -> f64 {
        let nyquist = self.sample_rate * 0.5;
        let freq = if freq.is_finite() { freq } else { 1000.0 };
        freq.clamp(1.0, nyquist * 0.99)
    }

    /// Recompute filter coefficients from current parameters.
    fn update_coefficients(&mut self) {
        let w0 = 2.0 * PI * self.frequency / self.sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * self.q);

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        let (b0, b1, b2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };

        // Normalize by a0
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let input = input as f64;
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;

        if output.is_finite() {
            output as f32
        } else {
            self.reset();
            0.0
        }
    }

    /// Filter a block in-place.
    pub fn apply(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_amplitude(f: &mut BiquadFilter, freq: f64, sample_rate: f64) -> f32 {
        let mut max_out = 0.0f32;
        for i in 0..8820 {
            let t = i as f64 / sample_rate;
            let out = f.process((2.0 * PI * freq * t).sin() as f32);
            if i > 4410 {
                // skip transient
                max_out = max_out.max(out.abs());
            }
        }
        max_out
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 44100.0, 5000.0);

        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.001, "Lowpass should pass DC, got {output}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 44100.0, 1000.0);

        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!(output.abs() < 0.001, "Highpass should block DC, got {output}");
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = BiquadFilter::new(FilterType::Lowpass, 44100.0, 200.0);
        let amp = steady_amplitude(&mut f, 10000.0, 44100.0);
        assert!(amp < 0.01, "Lowpass@200Hz should strongly attenuate 10kHz, got {amp}");
    }

    #[test]
    fn bandpass_peaks_at_center() {
        let mut f = BiquadFilter::new(FilterType::Bandpass, 44100.0, 1000.0);
        let center = steady_amplitude(&mut f, 1000.0, 44100.0);
        f.reset();
        let off = steady_amplitude(&mut f, 8000.0, 44100.0);
        assert!((center - 1.0).abs() < 0.05, "Unity gain at center, got {center}");
        assert!(off < center * 0.3, "Expected attenuation away from center: {off}");
    }

    #[test]
    fn cutoff_is_clamped_below_nyquist() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 16000.0, 11025.0);
        assert!(f.frequency() < 8000.0);
        f.set_frequency(f64::NAN);
        assert!(f.frequency().is_finite());
        for i in 0..1000 {
            let out = f.process(if i % 7 == 0 { 1.0 } else { -0.3 });
            assert!(out.is_finite());
        }
    }

    #[test]
    fn non_finite_input_resets_state() {
        let mut f = BiquadFilter::new(FilterType::Bandpass, 44100.0, 1000.0);
        assert_eq!(f.process(f32::NAN), 0.0);
        let out = f.process(0.5);
        assert!(out.is_finite());
    }
}
