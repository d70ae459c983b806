//! Doppler engine: variable-rate playback of a circular record buffer.
//!
//! Each call records the incoming block into a mono ring buffer and then
//! reads it back at a rate derived from a simulated observer circling a
//! sound source. The LFO position is mapped to an observer distance, the
//! distance to a tangential speed, and the speed to a Doppler rate that
//! stretches (or, when inverted, compresses) the read index.
//!
//! The logical read position is never wrapped; only the derived buffer
//! index is. Wrapping the logical position would change the outcome of the
//! `position / rate` division and produce a jump in the resampled stream.
//! Over very long sessions the `f64` counter slowly loses fractional
//! precision, which beat-synchronized resyncs bound in practice.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use super::interpolator::RateInterpolator;
use super::oscillator::{LFO_MIN_RATE, Lfo};

pub const MIN_DOPPLER_RATE: f32 = 0.5;
pub const MAX_DOPPLER_RATE: f32 = 2.0;
/// Observer distance range in meters.
pub const MIN_OBSERVER_DISTANCE: f32 = 1.0;
pub const MAX_OBSERVER_DISTANCE: f32 = 10.0;
/// In m/s.
pub const SPEED_OF_SOUND: f32 = 343.0;
/// Pole of the DC-blocking high-pass.
pub const DC_OFFSET_FILTER: f32 = 0.995;
/// Smoothing factor applied to the observer speed and the Doppler rate.
/// Much lower values (0.0005) turn rate changes into a tape slowdown.
pub const INTERPOLATION_SPEED: f32 = 0.005;
/// Default resync crossfade window.
pub const DEFAULT_CROSSFADE_MS: f32 = 10.0;

/// The record buffer holds one cycle of the slowest LFO.
const MAX_LFO_CYCLE_SECS: f32 = 1.0 / LFO_MIN_RATE;
/// Shortest active record length, in blocks.
const MIN_BUFFER_BLOCKS: usize = 4;

/// Read direction through the record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `index = position / rate`
    Forward,
    /// `index = position * rate`; reads behind the writer and needs a deep
    /// look-back before playback can start.
    Inverted,
}

impl Direction {
    fn slot(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Inverted => 1,
        }
    }
}

/// What the engine emits while the record buffer is still priming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimingMode {
    #[default]
    Silence,
    /// Leave the live input in the block.
    PassThrough,
}

/// How a beat-synchronized resync moves the read position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResyncMode {
    /// Jump straight to the synced position.
    Snap,
    /// Blend old and new trajectories over a short window, then commit.
    #[default]
    Crossfade,
}

/// Fractional read strategy for the record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Interpolation {
    #[default]
    Linear,
    /// 4-point Catmull-Rom.
    Cubic,
}

#[derive(Debug, Clone, Copy)]
struct Crossfade {
    /// Logical read position of the incoming trajectory at block start.
    target: f64,
    progress: usize,
}

/// Map an LFO value in [-1, 1] onto an observer distance in meters.
#[inline]
pub fn observer_distance(lfo_value: f32) -> f32 {
    let t = (lfo_value.clamp(-1.0, 1.0) + 1.0) * 0.5;
    MIN_OBSERVER_DISTANCE + t * (MAX_OBSERVER_DISTANCE - MIN_OBSERVER_DISTANCE)
}

/// Doppler rate for an observer moving at `observer_speed` m/s, clamped to
/// [`MIN_DOPPLER_RATE`, `MAX_DOPPLER_RATE`].
#[inline]
pub fn rate_from_speed(observer_speed: f32) -> f32 {
    let rate = (SPEED_OF_SOUND - observer_speed) / SPEED_OF_SOUND;
    if rate.is_finite() {
        rate.clamp(MIN_DOPPLER_RATE, MAX_DOPPLER_RATE)
    } else {
        1.0
    }
}

/// Unsmoothed Doppler rate for a given LFO output and LFO rate (Hz).
pub fn doppler_rate(lfo_value: f32, lfo_rate: f32) -> f32 {
    rate_from_speed(observer_distance(lfo_value) * lfo_rate * TAU)
}

/// Per-channel Doppler engine.
#[derive(Debug, Clone)]
pub struct DopplerEffect {
    sample_rate: f32,
    block_size: usize,

    lfo: Lfo,
    speed_smoother: RateInterpolator,
    rate_smoother: RateInterpolator,
    smooth_rate: bool,
    interpolation: Interpolation,
    priming: PrimingMode,
    resync: ResyncMode,

    record_buffer: Vec<f32>,
    /// Active length N, at most `record_buffer.len()`.
    buffer_len: usize,
    recording_length: f32,
    write_position: usize,
    read_position: f64,
    direction: Direction,

    reading: bool,
    total_recorded: usize,
    min_required: [usize; 2],

    beat_sync: bool,
    samples_per_beat: usize,
    processed_samples: u64,
    crossfade_len: usize,
    crossfade: Option<Crossfade>,

    prev_sample: f32,
    prev_filtered: f32,
}

impl DopplerEffect {
    /// Allocate the record buffer for the given configuration.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let capacity = ((sample_rate * MAX_LFO_CYCLE_SECS).ceil() as usize)
            .max(MIN_BUFFER_BLOCKS * block_size);

        let mut lfo = Lfo::new(sample_rate);
        lfo.set_rate(0.0);

        let mut engine = DopplerEffect {
            sample_rate,
            block_size,
            lfo,
            speed_smoother: RateInterpolator::new(0.0, INTERPOLATION_SPEED),
            rate_smoother: RateInterpolator::new(1.0, INTERPOLATION_SPEED),
            smooth_rate: true,
            interpolation: Interpolation::Linear,
            priming: PrimingMode::Silence,
            resync: ResyncMode::Crossfade,
            record_buffer: vec![0.0; capacity],
            buffer_len: capacity,
            recording_length: 1.0,
            write_position: 0,
            read_position: 0.0,
            direction: Direction::Forward,
            reading: false,
            total_recorded: 0,
            min_required: [0; 2],
            beat_sync: false,
            samples_per_beat: usize::MAX,
            processed_samples: 0,
            crossfade_len: 1,
            crossfade: None,
            prev_sample: 0.0,
            prev_filtered: 0.0,
        };
        engine.update_min_required();
        engine.set_crossfade_ms(DEFAULT_CROSSFADE_MS);
        engine
    }

    // ── Configuration ──────────────────────────────────────

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    pub fn set_priming_mode(&mut self, priming: PrimingMode) {
        self.priming = priming;
    }

    pub fn set_resync_mode(&mut self, resync: ResyncMode) {
        self.resync = resync;
    }

    /// Enable or disable smoothing of the observer speed and Doppler rate.
    pub fn set_rate_smoothing(&mut self, enabled: bool) {
        self.smooth_rate = enabled;
    }

    /// Crossfade window used by [`ResyncMode::Crossfade`].
    pub fn set_crossfade_ms(&mut self, ms: f32) {
        let samples = (ms.max(0.0) / 1000.0 * self.sample_rate) as usize;
        self.crossfade_len = samples.max(1);
    }

    // ── Parameters ─────────────────────────────────────────

    /// Set the LFO rate (Hz) and the read direction.
    ///
    /// Changing direction re-enters priming, which re-syncs the read
    /// position as soon as enough audio is recorded for the new direction.
    pub fn set_properties(&mut self, speed: f32, invert: bool) {
        self.lfo.set_rate(if speed.is_finite() { speed } else { 0.0 });

        let direction = if invert {
            Direction::Inverted
        } else {
            Direction::Forward
        };
        if direction != self.direction {
            self.direction = direction;
            self.reading = false;
            self.crossfade = None;
        }
    }

    /// Select the active portion of the record buffer (normalized 0..1).
    pub fn set_recording_length(&mut self, normalized: f32) {
        let normalized = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            1.0
        };
        if normalized == self.recording_length {
            return;
        }
        self.recording_length = normalized;

        let capacity = self.record_buffer.len();
        let min_len = (MIN_BUFFER_BLOCKS * self.block_size).min(capacity);
        let len = ((normalized * capacity as f32) as usize).clamp(min_len, capacity);
        if len != self.buffer_len {
            self.resize_active(len);
        }
    }

    /// Beat length in samples, as derived from the host transport.
    /// `None` or a non-positive length disables beat resync.
    pub fn set_samples_per_beat(&mut self, samples: Option<f64>) {
        self.samples_per_beat = match samples {
            Some(n) if n.is_finite() && n > 0.0 => (n.round() as usize).max(1),
            _ => usize::MAX,
        };
    }

    pub fn set_beat_sync(&mut self, enabled: bool) {
        self.beat_sync = enabled;
    }

    // ── State ──────────────────────────────────────────────

    pub fn lfo_rate(&self) -> f32 {
        self.lfo.rate()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether playback has started since the last reset.
    pub fn is_primed(&self) -> bool {
        self.reading
    }

    /// Active record length N.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Preallocated record buffer size.
    pub fn capacity(&self) -> usize {
        self.record_buffer.len()
    }

    pub fn write_position(&self) -> usize {
        self.write_position
    }

    pub fn read_position(&self) -> f64 {
        self.read_position
    }

    /// Samples that must be recorded before playback in `direction`.
    pub fn min_required(&self, direction: Direction) -> usize {
        self.min_required[direction.slot()]
    }

    pub fn samples_per_beat(&self) -> Option<usize> {
        (self.samples_per_beat != usize::MAX).then_some(self.samples_per_beat)
    }

    /// Restart the LFO at phase 0.
    pub fn reset_oscillator(&mut self) {
        self.lfo.set_phase(0.0);
    }

    /// Clear the record buffer and return to the priming phase.
    pub fn reset(&mut self) {
        self.record_buffer.fill(0.0);
        self.write_position = 0;
        self.read_position = 0.0;
        self.reading = false;
        self.total_recorded = 0;
        self.processed_samples = 0;
        self.crossfade = None;
        self.prev_sample = 0.0;
        self.prev_filtered = 0.0;
        self.speed_smoother.reset(0.0);
        self.rate_smoother.reset(1.0);
        self.reset_oscillator();
    }

    // ── Processing ─────────────────────────────────────────

    /// Record `samples` and overwrite them with the resampled output.
    ///
    /// Input longer than the configured block size is handled in
    /// block-sized chunks.
    pub fn apply(&mut self, samples: &mut [f32]) {
        let block_size = self.block_size;
        for chunk in samples.chunks_mut(block_size) {
            self.apply_block(chunk);
        }
    }

    fn apply_block(&mut self, samples: &mut [f32]) {
        let len = samples.len();
        let block_start = self.write_position;

        self.record(samples);
        self.total_recorded = (self.total_recorded + len).min(self.buffer_len);

        if !self.reading {
            if self.total_recorded < self.min_required[self.direction.slot()] {
                self.processed_samples += len as u64;
                if self.priming == PrimingMode::Silence {
                    samples.fill(0.0);
                }
                return;
            }
            self.reading = true;
            self.read_position = self.synced_position(block_start);
            self.crossfade = None;
        }

        let lfo_rate = self.lfo.rate();
        let modulating = lfo_rate != 0.0;
        let beat = self.samples_per_beat as u64;

        for (i, out) in samples.iter_mut().enumerate() {
            self.processed_samples += 1;
            if self.beat_sync && self.processed_samples % beat == 0 {
                self.resync(block_start);
            }

            let rate = if modulating { self.next_rate(lfo_rate) } else { 1.0 };
            let offset = i as f64;

            let mut sample = self.read_at(self.resample(self.read_position + offset, rate));

            if let Some(mut fade) = self.crossfade {
                // reaches 1 on the last sample of the window
                let weight = ((fade.progress + 1) as f32 / self.crossfade_len as f32).min(1.0);
                let incoming = self.read_at(self.resample(fade.target + offset, rate));
                sample = sample * (1.0 - weight) + incoming * weight;
                fade.progress += 1;
                self.crossfade = Some(fade);
            }

            *out = self.dc_block(sample);
        }

        self.read_position += len as f64;

        if let Some(mut fade) = self.crossfade {
            fade.target += len as f64;
            if fade.progress >= self.crossfade_len {
                self.read_position = fade.target;
                self.crossfade = None;
            } else {
                self.crossfade = Some(fade);
            }
        }
    }

    /// Append a block at the write position, splitting at the wrap point.
    fn record(&mut self, samples: &[f32]) {
        let start = self.write_position;
        let first = (self.buffer_len - start).min(samples.len());
        let rest = samples.len() - first;

        self.record_buffer[start..start + first].copy_from_slice(&samples[..first]);
        self.record_buffer[..rest].copy_from_slice(&samples[first..]);

        self.write_position = (start + samples.len()) % self.buffer_len;
    }

    /// Logical read position that trails the writer by the priming depth
    /// of the current direction.
    fn synced_position(&self, block_start: usize) -> f64 {
        block_start as f64 - self.min_required[self.direction.slot()] as f64
    }

    fn resync(&mut self, block_start: usize) {
        let target = self.synced_position(block_start);
        match self.resync {
            ResyncMode::Snap => self.read_position = target,
            ResyncMode::Crossfade => {
                if self.crossfade.is_none() {
                    self.crossfade = Some(Crossfade { target, progress: 0 });
                }
            }
        }
    }

    #[inline]
    fn next_rate(&mut self, lfo_rate: f32) -> f32 {
        let distance = observer_distance(self.lfo.peek());
        let mut speed = distance * lfo_rate * TAU;
        if self.smooth_rate {
            speed = self.speed_smoother.set_value(speed);
        }
        let rate = rate_from_speed(speed);
        if self.smooth_rate {
            self.rate_smoother.set_value(rate)
        } else {
            rate
        }
    }

    #[inline]
    fn resample(&self, position: f64, rate: f32) -> f64 {
        match self.direction {
            Direction::Inverted => position * rate as f64,
            Direction::Forward => position / rate as f64,
        }
    }

    /// Fractional read with wrap-around; non-finite results become silence.
    #[inline]
    fn read_at(&self, index: f64) -> f32 {
        let len = self.buffer_len;
        let n = len as f64;

        let mut wrapped = index % n;
        if wrapped < 0.0 {
            wrapped += n;
        }
        if !wrapped.is_finite() {
            return 0.0;
        }

        let mut i0 = wrapped as usize;
        let mut frac = (wrapped - i0 as f64) as f32;
        if i0 >= len {
            i0 = 0;
            frac = 0.0;
        }
        let buf = &self.record_buffer;
        let i1 = (i0 + 1) % len;

        let sample = match self.interpolation {
            Interpolation::Linear => buf[i0] + (buf[i1] - buf[i0]) * frac,
            Interpolation::Cubic => {
                let y0 = buf[(i0 + len - 1) % len];
                let y3 = buf[(i0 + 2) % len];
                catmull_rom(y0, buf[i0], buf[i1], y3, frac)
            }
        };

        if sample.is_finite() {
            sample.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// One-pole DC blocker; a non-finite result resets its state.
    #[inline]
    fn dc_block(&mut self, sample: f32) -> f32 {
        let filtered = sample - self.prev_sample + DC_OFFSET_FILTER * self.prev_filtered;
        if !filtered.is_finite() {
            self.prev_sample = 0.0;
            self.prev_filtered = 0.0;
            return 0.0;
        }
        self.prev_sample = sample;
        self.prev_filtered = filtered;
        filtered
    }

    fn resize_active(&mut self, len: usize) {
        self.buffer_len = len;
        self.write_position %= len;
        self.total_recorded = self.total_recorded.min(len);
        self.update_min_required();
        // re-prime so the read position is re-derived for the new length
        self.reading = false;
        self.crossfade = None;
    }

    fn update_min_required(&mut self) {
        let len = self.buffer_len;
        let forward = self.block_size.min(len);
        let inverted = (len / 2).max(self.block_size).min(len);
        self.min_required = [forward, inverted];
    }
}

#[inline]
fn catmull_rom(y0: f32, y1: f32, y2: f32, y3: f32, x: f32) -> f32 {
    y1 + 0.5
        * x
        * (y2 - y0
            + x * (2.0 * y0 - 5.0 * y1 + 4.0 * y2 - y3 + x * (3.0 * (y1 - y2) + y3 - y0)))
}
