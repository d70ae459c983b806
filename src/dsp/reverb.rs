//! Freeverb-style algorithmic reverb.
//!
//! Uses parallel comb filters followed by series allpass filters. One
//! instance processes one channel; instances for different channels are
//! decorrelated by offsetting every delay line with a stereo spread.

use tracing::debug;

/// A comb filter delay line with damped feedback.
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    damp1: f32,
    damp2: f32,
    filterstore: f32,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback: 0.0,
            damp1: 0.0,
            damp2: 1.0,
            filterstore: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index];

        // lowpass in the feedback path
        self.filterstore = output * self.damp2 + self.filterstore * self.damp1;

        self.buffer[self.index] = input + self.filterstore * self.feedback;
        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }

        output
    }

    fn set_damp(&mut self, damp: f32) {
        self.damp1 = damp;
        self.damp2 = 1.0 - damp;
    }

    fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback;
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
        self.filterstore = 0.0;
    }

    fn is_finite(&self) -> bool {
        self.filterstore.is_finite()
    }
}

/// An allpass filter delay line.
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback: ALLPASS_FEEDBACK,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let bufout = self.buffer[self.index];
        let output = -input + bufout;

        self.buffer[self.index] = input + bufout * self.feedback;
        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }

        output
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
    }
}

// Tuning constants (reference tunings at 44100 Hz)
const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
pub const STEREO_SPREAD: usize = 23;

const ALLPASS_FEEDBACK: f32 = 0.5;
const FIXED_GAIN: f32 = 0.015;
const SCALE_DAMP: f32 = 0.4;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;

pub const DEFAULT_FREEZE_TIMEOUT_SECS: f32 = 1.0;

/// Reverb operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverbMode {
    Normal,
    /// Freeze requested; the tail keeps building until the timeout elapses.
    FreezePending,
    /// Feedback at unity, input muted: the tail sustains indefinitely.
    Frozen,
}

/// A mono Freeverb reverberator.
#[derive(Debug, Clone)]
pub struct Reverb {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,

    /// Room size (0.0 to 1.0). Affects decay time.
    room_size: f32,
    /// Damping (0.0 to 1.0). Higher = darker sound.
    damp: f32,
    wet: f32,
    dry: f32,
    /// Stereo width (0.0 to 1.0).
    width: f32,

    mode: ReverbMode,
    sample_rate: f32,
    freeze_timeout_secs: f32,
    freeze_delay: i64,

    gain: f32,
    wet1: f32,
}

impl Reverb {
    /// Create a reverb tuned to `sample_rate`.
    ///
    /// `spread` offsets every delay line by `spread` samples; pass the
    /// channel index times [`STEREO_SPREAD`] to decorrelate channels.
    pub fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = sample_rate / 44100.0;
        let tuned = |t: usize| ((t as f32) * scale) as usize + spread;

        let combs = COMB_TUNING.iter().map(|&t| CombFilter::new(tuned(t))).collect();
        let allpasses = ALLPASS_TUNING
            .iter()
            .map(|&t| AllpassFilter::new(tuned(t)))
            .collect();

        let mut reverb = Self {
            combs,
            allpasses,
            room_size: 0.5,
            damp: 0.5,
            wet: 1.0,
            dry: 0.5,
            width: 1.0,
            mode: ReverbMode::Normal,
            sample_rate,
            freeze_timeout_secs: DEFAULT_FREEZE_TIMEOUT_SECS,
            freeze_delay: 0,
            gain: FIXED_GAIN,
            wet1: 0.0,
        };

        reverb.update();
        reverb
    }

    /// Create a reverb with specific parameters.
    pub fn with_params(sample_rate: f32, room_size: f32, damp: f32, wet: f32, dry: f32) -> Self {
        let mut r = Self::new(sample_rate, 0);
        r.room_size = room_size.clamp(0.0, 1.0);
        r.damp = damp.clamp(0.0, 1.0);
        r.wet = wet.clamp(0.0, 1.0);
        r.dry = dry.clamp(0.0, 1.0);
        r.update();
        r
    }

    /// Whether `apply` does anything at all.
    pub fn is_active(&self) -> bool {
        self.wet > 0.0
    }

    pub fn room_size(&self) -> f32 {
        self.room_size
    }

    pub fn set_room_size(&mut self, value: f32) {
        self.room_size = value.clamp(0.0, 1.0);
        self.update();
    }

    pub fn damp(&self) -> f32 {
        self.damp
    }

    pub fn set_damp(&mut self, value: f32) {
        self.damp = value.clamp(0.0, 1.0);
        self.update();
    }

    pub fn wet(&self) -> f32 {
        self.wet
    }

    pub fn set_wet(&mut self, value: f32) {
        self.wet = value.clamp(0.0, 1.0);
        self.update();
    }

    pub fn dry(&self) -> f32 {
        self.dry
    }

    pub fn set_dry(&mut self, value: f32) {
        self.dry = value.clamp(0.0, 1.0);
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn set_width(&mut self, value: f32) {
        self.width = value.clamp(0.0, 1.0);
        self.update();
    }

    pub fn mode(&self) -> ReverbMode {
        self.mode
    }

    pub fn set_freeze_timeout(&mut self, secs: f32) {
        self.freeze_timeout_secs = secs.max(0.0);
    }

    /// Request or release freeze.
    ///
    /// Freezing from `Normal` goes through `FreezePending` first so the tail
    /// can build up. Releasing always returns straight to `Normal`.
    pub fn set_freeze(&mut self, freeze: bool) {
        match (freeze, self.mode) {
            (true, ReverbMode::Normal) => {
                self.mode = ReverbMode::FreezePending;
                self.freeze_delay = (self.freeze_timeout_secs * self.sample_rate) as i64;
                debug!(delay_samples = self.freeze_delay, "reverb freeze pending");
            }
            (false, ReverbMode::FreezePending | ReverbMode::Frozen) => {
                self.mode = ReverbMode::Normal;
                self.update();
            }
            _ => {}
        }
    }

    pub fn toggle_freeze(&mut self) {
        self.set_freeze(self.mode == ReverbMode::Normal);
    }

    /// Process one sample.
    #[inline]
    pub fn process_single(&mut self, input: f32) -> f32 {
        let input = if input.is_finite() { input } else { 0.0 };
        let scaled = input * self.gain;

        // Sum comb filters in parallel
        let mut out = 0.0f32;
        for comb in &mut self.combs {
            out += comb.process(scaled);
        }

        // Process through allpass filters in series
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }

        out * self.wet1 + input * self.dry
    }

    /// Process a block in-place.
    ///
    /// A fully dry reverb leaves the block untouched, but a pending freeze
    /// still counts down.
    pub fn apply(&mut self, samples: &mut [f32]) {
        if self.is_active() {
            for sample in samples.iter_mut() {
                *sample = self.process_single(*sample);
            }

            // a NaN in any feedback path would poison the tail forever
            if !self.combs.iter().all(CombFilter::is_finite) {
                self.clear();
                samples.fill(0.0);
            }
        }

        if self.mode == ReverbMode::FreezePending {
            self.freeze_delay -= samples.len() as i64;
            if self.freeze_delay <= 0 {
                self.mode = ReverbMode::Frozen;
                self.update();
            }
        }
    }

    /// Silence all delay lines, unless frozen.
    pub fn mute(&mut self) {
        if self.mode == ReverbMode::Frozen {
            return;
        }
        self.clear();
    }

    /// Tail length in seconds; `None` while the tail is sustained.
    pub fn tail_length_secs(&self) -> Option<f32> {
        if self.mode == ReverbMode::Frozen {
            return None;
        }
        // time for the longest comb to decay by 60 dB
        let feedback = self.room_size * SCALE_ROOM + OFFSET_ROOM;
        let longest = self.combs.iter().map(|c| c.buffer.len()).max().unwrap_or(0) as f32;
        let passes = (-3.0 / feedback.log10()).max(1.0);
        Some(longest * passes / self.sample_rate)
    }

    fn clear(&mut self) {
        for comb in &mut self.combs {
            comb.mute();
        }
        for allpass in &mut self.allpasses {
            allpass.mute();
        }
    }

    /// Update internal coefficients after a parameter or mode change.
    fn update(&mut self) {
        self.wet1 = self.wet * (self.width / 2.0 + 0.5);

        let (feedback, damp) = if self.mode == ReverbMode::Frozen {
            self.gain = 0.0;
            (1.0, 0.0)
        } else {
            self.gain = FIXED_GAIN;
            (
                self.room_size * SCALE_ROOM + OFFSET_ROOM,
                self.damp * SCALE_DAMP,
            )
        };

        for comb in &mut self.combs {
            comb.set_feedback(feedback);
            comb.set_damp(damp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay_lines(reverb: &Reverb) -> Vec<Vec<f32>> {
        reverb
            .combs
            .iter()
            .map(|c| c.buffer.clone())
            .chain(reverb.allpasses.iter().map(|a| a.buffer.clone()))
            .collect()
    }

    #[test]
    fn inactive_when_fully_dry() {
        let mut reverb = Reverb::with_params(44100.0, 0.5, 0.5, 0.0, 0.5);
        assert!(!reverb.is_active());

        let mut block = [0.5, -0.5, 0.25, 1.0];
        reverb.apply(&mut block);
        assert_eq!(block, [0.5, -0.5, 0.25, 1.0]);
    }

    #[test]
    fn produces_tail_after_impulse() {
        let mut reverb = Reverb::with_params(44100.0, 0.5, 0.5, 1.0, 0.0);
        reverb.process_single(1.0);

        let found = (0..5000).any(|_| reverb.process_single(0.0).abs() > 1e-4);
        assert!(found, "Reverb should produce output after impulse");
    }

    #[test]
    fn decays_over_time() {
        let mut reverb = Reverb::with_params(44100.0, 0.3, 0.5, 1.0, 0.0);
        reverb.process_single(1.0);

        let mut early_max = 0.0f32;
        for _ in 0..4000 {
            early_max = early_max.max(reverb.process_single(0.0).abs());
        }
        let mut late_max = 0.0f32;
        for _ in 0..44100 {
            reverb.process_single(0.0);
        }
        for _ in 0..4000 {
            late_max = late_max.max(reverb.process_single(0.0).abs());
        }
        assert!(early_max > 0.0);
        assert!(late_max < early_max * 0.1, "Expected decay: {early_max} -> {late_max}");
    }

    #[test]
    fn dry_path_is_unscaled_input() {
        let mut reverb = Reverb::with_params(44100.0, 0.5, 0.5, 1.0, 1.0);
        // first sample: every delay line still empty
        let out = reverb.process_single(0.8);
        assert!((out - 0.8).abs() < 1e-6);
    }

    #[test]
    fn freeze_waits_for_timeout() {
        let mut reverb = Reverb::with_params(1000.0, 0.5, 0.5, 1.0, 0.0);
        reverb.set_freeze_timeout(0.5);
        reverb.set_freeze(true);
        assert_eq!(reverb.mode(), ReverbMode::FreezePending);

        let mut block = [0.1f32; 100];
        for _ in 0..4 {
            reverb.apply(&mut block);
            assert_eq!(reverb.mode(), ReverbMode::FreezePending);
        }
        reverb.apply(&mut block);
        assert_eq!(reverb.mode(), ReverbMode::Frozen);

        // repeated requests do not restart the pending state
        reverb.set_freeze(true);
        assert_eq!(reverb.mode(), ReverbMode::Frozen);

        reverb.set_freeze(false);
        assert_eq!(reverb.mode(), ReverbMode::Normal);
    }

    #[test]
    fn mute_preserves_frozen_tail() {
        let mut reverb = Reverb::with_params(1000.0, 0.8, 0.2, 1.0, 0.0);
        reverb.set_freeze_timeout(0.0);
        let mut block: Vec<f32> = (0..256).map(|n| ((n as f32) * 0.3).sin()).collect();
        reverb.apply(&mut block);

        reverb.set_freeze(true);
        reverb.apply(&mut [0.0; 16]);
        assert_eq!(reverb.mode(), ReverbMode::Frozen);

        let before = delay_lines(&reverb);
        reverb.mute();
        assert_eq!(before, delay_lines(&reverb));

        reverb.set_freeze(false);
        reverb.mute();
        assert!(delay_lines(&reverb).iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn frozen_tail_sustains_and_ignores_input() {
        let mut reverb = Reverb::with_params(8000.0, 0.9, 0.0, 1.0, 0.0);
        reverb.set_freeze_timeout(0.0);
        reverb.process_single(1.0);
        for _ in 0..500 {
            reverb.process_single(0.0);
        }
        reverb.set_freeze(true);
        reverb.apply(&mut [0.0; 1]);
        assert_eq!(reverb.mode(), ReverbMode::Frozen);

        let mut late = vec![0.0f32; 8000];
        for _ in 0..4 {
            late.fill(0.0);
            reverb.apply(&mut late);
        }
        let energy: f32 = late.iter().map(|s| s * s).sum();
        assert!(energy > 1e-8, "Frozen tail should keep ringing");
        assert!(late.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn non_finite_input_is_silenced() {
        let mut reverb = Reverb::with_params(44100.0, 0.5, 0.5, 0.3, 1.0);
        let mut block = [0.1, f32::NAN, 0.1, f32::INFINITY];
        reverb.apply(&mut block);
        assert!(block.iter().all(|s| s.is_finite()), "Got {block:?}");
        assert!((block[0] - 0.1).abs() < 1e-6);
        assert!(block[1].abs() < 1e-3);

        // the tail stays clean long after the bad samples
        let mut later = vec![0.1f32; 4096];
        reverb.apply(&mut later);
        assert!(later.iter().all(|s| s.is_finite()));
        assert!(later.iter().all(|&s| s != 0.0), "Tail should not be wiped");
    }

    #[test]
    fn freeze_counts_down_while_dry() {
        let mut reverb = Reverb::with_params(1000.0, 0.5, 0.5, 0.0, 1.0);
        reverb.set_freeze_timeout(0.05);
        reverb.set_freeze(true);
        assert_eq!(reverb.mode(), ReverbMode::FreezePending);

        let mut block = [0.3f32; 64];
        reverb.apply(&mut block);
        assert_eq!(reverb.mode(), ReverbMode::Frozen);
        assert!(block.iter().all(|&s| s == 0.3), "Dry reverb must not touch audio");
    }

    #[test]
    fn toggle_freeze_cycles() {
        let mut reverb = Reverb::new(44100.0, 0);
        reverb.toggle_freeze();
        assert_eq!(reverb.mode(), ReverbMode::FreezePending);
        reverb.toggle_freeze();
        assert_eq!(reverb.mode(), ReverbMode::Normal);
    }

    #[test]
    fn spread_lengthens_delay_lines() {
        let left = Reverb::new(44100.0, 0);
        let right = Reverb::new(44100.0, STEREO_SPREAD);
        for (l, r) in left.combs.iter().zip(&right.combs) {
            assert_eq!(l.buffer.len() + STEREO_SPREAD, r.buffer.len());
        }
    }

    #[test]
    fn tail_length_reported() {
        let mut reverb = Reverb::new(44100.0, 0);
        assert!(reverb.tail_length_secs().unwrap() > 0.0);
        reverb.set_freeze_timeout(0.0);
        reverb.set_freeze(true);
        reverb.apply(&mut [0.0; 1]);
        assert!(reverb.tail_length_secs().is_none());
    }
}
