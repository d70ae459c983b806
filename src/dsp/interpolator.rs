//! One-pole exponential smoother for control values.

/// Moves a value toward its target by a fixed fraction per call.
///
/// With `smoothing_factor` in (0, 1] the output approaches the target
/// monotonically and never overshoots it.
#[derive(Debug, Clone, Copy)]
pub struct RateInterpolator {
    current: f32,
    target: f32,
    smoothing_factor: f32,
}

impl RateInterpolator {
    pub fn new(initial: f32, smoothing_factor: f32) -> Self {
        RateInterpolator {
            current: initial,
            target: initial,
            smoothing_factor: smoothing_factor.clamp(f32::MIN_POSITIVE, 1.0),
        }
    }

    /// Set a new target and return the smoothed value after one step.
    #[inline]
    pub fn set_value(&mut self, target: f32) -> f32 {
        self.target = target;
        self.current += self.smoothing_factor * (self.target - self.current);
        self.current
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Jump straight to `value`, discarding any pending glide.
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }
}
