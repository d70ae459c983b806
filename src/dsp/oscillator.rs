//! Sine LFO driving the simulated source movement.

use std::f32::consts::TAU;

/// Slowest musically useful LFO rate in Hz.
pub const LFO_MIN_RATE: f32 = 0.1;
/// Fastest musically useful LFO rate in Hz.
pub const LFO_MAX_RATE: f32 = 10.0;

/// A low-frequency sine oscillator.
///
/// `peek()` is a stateful read: every call returns the value at the current
/// phase and then advances the phase by one sample. Restart the sequence
/// with `set_phase(0.0)`.
#[derive(Debug, Clone)]
pub struct Lfo {
    rate: f32,
    depth: f32,
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
}

impl Lfo {
    pub fn new(sample_rate: f32) -> Self {
        let mut lfo = Lfo {
            rate: 0.0,
            depth: 1.0,
            phase: 0.0,
            phase_inc: 0.0,
            sample_rate,
        };
        lfo.set_rate(LFO_MIN_RATE);
        lfo
    }

    /// Oscillation rate in Hz.
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Set the rate in Hz. Any finite value is accepted; the caller clamps
    /// to [`LFO_MIN_RATE`, `LFO_MAX_RATE`] where that matters.
    pub fn set_rate(&mut self, hz: f32) {
        self.rate = hz;
        self.phase_inc = hz / self.sample_rate;
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth;
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Set the phase, wrapped into [0, 1).
    pub fn set_phase(&mut self, phase: f32) {
        let wrapped = phase.rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative inputs
        self.phase = if wrapped >= 1.0 { 0.0 } else { wrapped };
    }

    /// Return `sin(2π·phase)·depth`, then advance the phase by one sample.
    #[inline]
    pub fn peek(&mut self) -> f32 {
        let value = (TAU * self.phase).sin() * self.depth;

        self.phase += self.phase_inc;
        // rates at or above the sample rate can step more than one cycle
        if !(0.0..1.0).contains(&self.phase) {
            self.phase = self.phase.rem_euclid(1.0);
            if self.phase >= 1.0 {
                self.phase = 0.0;
            }
        }
        value
    }
}

/// Map a normalized control value onto an LFO rate in Hz.
///
/// Zero is kept as zero so that a fully closed control disables modulation.
pub fn rate_from_normalized(value: f32) -> f32 {
    if value <= 0.0 || !value.is_finite() {
        0.0
    } else {
        LFO_MIN_RATE + value.min(1.0) * (LFO_MAX_RATE - LFO_MIN_RATE)
    }
}
