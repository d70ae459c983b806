//! Bit-depth reduction by masking a 16-bit integer rendition of each sample.

const FULL_BITS: u32 = 16;
const I16_SCALE: f32 = 32767.0;

/// Bit crusher.
///
/// `amount` is inverted internally: 0 leaves the signal at 16 bits, 1 crushes
/// it down to a single bit.
#[derive(Debug, Clone)]
pub struct BitCrusher {
    amount: f32,
    bits: u32,
    input_mix: f32,
    output_mix: f32,
}

impl BitCrusher {
    pub fn new(amount: f32, input_mix: f32, output_mix: f32) -> Self {
        let mut crusher = BitCrusher {
            amount: 0.0,
            bits: FULL_BITS,
            input_mix: 1.0,
            output_mix: 1.0,
        };
        crusher.set_amount(amount);
        crusher.set_input_mix(input_mix);
        crusher.set_output_mix(output_mix);
        crusher
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Set the reduction amount (0..1) and derive the effective bit depth.
    pub fn set_amount(&mut self, amount: f32) {
        let amount = if amount.is_finite() { amount.clamp(0.0, 1.0) } else { 0.0 };
        self.amount = amount;
        let inverted = 1.0 - amount;
        self.bits = ((1.0 + inverted * (FULL_BITS - 1) as f32) as u32).clamp(1, FULL_BITS);
    }

    /// Effective bit depth in [1, 16].
    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn set_input_mix(&mut self, mix: f32) {
        self.input_mix = mix.clamp(0.0, 1.0);
    }

    pub fn set_output_mix(&mut self, mix: f32) {
        self.output_mix = mix.clamp(0.0, 1.0);
    }

    pub fn is_active(&self) -> bool {
        self.bits < FULL_BITS
    }

    /// Crush a block in-place.
    pub fn apply(&mut self, samples: &mut [f32]) {
        if !self.is_active() {
            return;
        }

        let dropped = FULL_BITS - self.bits;
        let mask: i32 = !((1i32 << dropped) - 1);
        // centre each quantization step on the interval it covers
        let half_step = (1i32 << dropped) >> 1;

        for s in samples.iter_mut() {
            let x = if s.is_finite() { *s * self.input_mix } else { 0.0 };
            let q = ((x.clamp(-1.0, 1.0) * I16_SCALE) as i32) & mask;
            let q = (q + half_step).clamp(i16::MIN as i32, i16::MAX as i32);
            *s = q as f32 / I16_SCALE * self.output_mix;
        }
    }
}

impl Default for BitCrusher {
    fn default() -> Self {
        BitCrusher::new(0.0, 1.0, 1.0)
    }
}
