//! Parametric soft-clip saturation.

/// Largest usable drive amount; the curve coefficient diverges at 1.
pub const MAX_AMOUNT: f32 = 0.99999;

#[derive(Debug, Clone)]
pub struct WaveShaper {
    amount: f32,
    level: f32,
    k: f32,
}

impl WaveShaper {
    pub fn new(amount: f32, level: f32) -> Self {
        let mut shaper = WaveShaper {
            amount: 0.0,
            level: 1.0,
            k: 0.0,
        };
        shaper.set_amount(amount);
        shaper.set_level(level);
        shaper
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32) {
        let amount = if amount.is_finite() { amount.clamp(0.0, MAX_AMOUNT) } else { 0.0 };
        self.amount = amount;
        self.k = 2.0 * amount / (1.0 - amount);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = if level.is_finite() { level.max(0.0) } else { 0.0 };
    }

    pub fn is_active(&self) -> bool {
        self.amount > 0.0 || self.level != 1.0
    }

    #[inline]
    pub fn process(&self, input: f32) -> f32 {
        let x = if input.is_finite() { input.clamp(-1.0, 1.0) } else { 0.0 };
        (1.0 + self.k) * x / (1.0 + self.k * x.abs()) * self.level
    }

    pub fn apply(&mut self, samples: &mut [f32]) {
        if !self.is_active() {
            return;
        }
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }
}

impl Default for WaveShaper {
    fn default() -> Self {
        WaveShaper::new(0.0, 1.0)
    }
}
