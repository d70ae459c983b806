//! Tunable parameters shared between the control thread and the audio thread.
//!
//! The control side writes through [`Parameters`], a set of independent
//! atomic scalars. The audio side takes one [`ParameterSnapshot`] per block;
//! reading never blocks or allocates.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Deserializer, Serialize};

use crate::dsp::waveshaper;

/// An `f32` stored as its bit pattern.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        AtomicF32(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Valid range and default of a float parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        ParamRange { min, max, default }
    }

    /// Clamp into range; non-finite values fall back to the default.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }
}

pub const LFO_AMOUNT: ParamRange = ParamRange::new(0.0, 1.0, 0.0);
pub const LOW_FREQUENCY: ParamRange = ParamRange::new(20.0, 500.0, 200.0);
pub const MID_FREQUENCY: ParamRange = ParamRange::new(500.0, 3000.0, 1000.0);
pub const HIGH_FREQUENCY: ParamRange = ParamRange::new(5000.0, 11025.0, 5000.0);
pub const BIT_AMOUNT: ParamRange = ParamRange::new(0.0, 1.0, 0.0);
pub const BIT_MIX: ParamRange = ParamRange::new(0.0, 1.0, 1.0);
pub const DRIVE: ParamRange = ParamRange::new(0.0, waveshaper::MAX_AMOUNT, 0.0);
pub const DRIVE_LEVEL: ParamRange = ParamRange::new(0.0, 1.0, 1.0);
pub const ROOM_SIZE: ParamRange = ParamRange::new(0.0, 1.0, 0.5);
pub const DAMP: ParamRange = ParamRange::new(0.0, 1.0, 0.5);
pub const REVERB_WET: ParamRange = ParamRange::new(0.0, 1.0, 0.3);
pub const REVERB_DRY: ParamRange = ParamRange::new(0.0, 1.0, 1.0);
pub const WIDTH: ParamRange = ParamRange::new(0.0, 1.0, 1.0);
pub const RECORDING_LENGTH: ParamRange = ParamRange::new(0.0, 1.0, 1.0);
pub const WET_DRY_MIX: ParamRange = ParamRange::new(0.0, 1.0, 0.5);

/// One of the three parallel frequency bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Low, Band::Mid, Band::High];

    pub fn index(self) -> usize {
        match self {
            Band::Low => 0,
            Band::Mid => 1,
            Band::High => 2,
        }
    }

    pub fn frequency_range(self) -> ParamRange {
        match self {
            Band::Low => LOW_FREQUENCY,
            Band::Mid => MID_FREQUENCY,
            Band::High => HIGH_FREQUENCY,
        }
    }
}

// ── Snapshot ───────────────────────────────────────────────

/// Plain values of one band's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSnapshot {
    /// Normalized LFO rate for odd channels (1, 3, ..).
    pub lfo_odd: f32,
    /// Normalized LFO rate for even channels (2, 4, ..).
    pub lfo_even: f32,
    /// Even channels follow `lfo_odd`.
    pub lfo_link: bool,
    /// Filter cutoff / center in Hz.
    pub frequency: f32,
}

impl BandSnapshot {
    pub fn defaults(band: Band) -> Self {
        let (lfo_odd, lfo_even) = match band {
            Band::Mid => (0.01, 0.05),
            Band::Low | Band::High => (0.0, 0.0),
        };
        BandSnapshot {
            lfo_odd,
            lfo_even,
            lfo_link: true,
            frequency: band.frequency_range().default,
        }
    }

    /// Normalized LFO value driving zero-based `channel`.
    ///
    /// Channel 0 is the first (odd) channel.
    pub fn lfo_for_channel(&self, channel: usize) -> f32 {
        if channel % 2 == 0 || self.lfo_link {
            self.lfo_odd
        } else {
            self.lfo_even
        }
    }

    fn clamped(self, band: Band) -> Self {
        BandSnapshot {
            lfo_odd: LFO_AMOUNT.clamp(self.lfo_odd),
            lfo_even: LFO_AMOUNT.clamp(self.lfo_even),
            lfo_link: self.lfo_link,
            frequency: band.frequency_range().clamp(self.frequency),
        }
    }
}

/// A band object in which any key may be left out.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BandPatch {
    lfo_odd: Option<f32>,
    lfo_even: Option<f32>,
    lfo_link: Option<bool>,
    frequency: Option<f32>,
}

impl BandPatch {
    fn over(self, base: BandSnapshot) -> BandSnapshot {
        BandSnapshot {
            lfo_odd: self.lfo_odd.unwrap_or(base.lfo_odd),
            lfo_even: self.lfo_even.unwrap_or(base.lfo_even),
            lfo_link: self.lfo_link.unwrap_or(base.lfo_link),
            frequency: self.frequency.unwrap_or(base.frequency),
        }
    }
}

fn band_or_defaults<'de, D: Deserializer<'de>>(
    band: Band,
    deserializer: D,
) -> Result<BandSnapshot, D::Error> {
    BandPatch::deserialize(deserializer).map(|patch| patch.over(BandSnapshot::defaults(band)))
}

fn low_band<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BandSnapshot, D::Error> {
    band_or_defaults(Band::Low, deserializer)
}

fn mid_band<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BandSnapshot, D::Error> {
    band_or_defaults(Band::Mid, deserializer)
}

fn high_band<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BandSnapshot, D::Error> {
    band_or_defaults(Band::High, deserializer)
}

/// Plain values of every tunable parameter at one instant.
///
/// Doubles as a JSON preset; missing keys take their defaults, inside the
/// band objects too.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterSnapshot {
    #[serde(deserialize_with = "low_band")]
    pub low: BandSnapshot,
    #[serde(deserialize_with = "mid_band")]
    pub mid: BandSnapshot,
    #[serde(deserialize_with = "high_band")]
    pub high: BandSnapshot,

    pub bit_amount: f32,
    pub bit_mix: f32,

    pub drive: f32,
    pub drive_level: f32,

    pub room_size: f32,
    pub damp: f32,
    pub reverb_wet: f32,
    pub reverb_dry: f32,
    pub width: f32,
    pub freeze: bool,

    pub invert_direction: bool,
    pub beat_sync: bool,
    pub recording_length: f32,

    pub wet_dry_mix: f32,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        ParameterSnapshot {
            low: BandSnapshot::defaults(Band::Low),
            mid: BandSnapshot::defaults(Band::Mid),
            high: BandSnapshot::defaults(Band::High),
            bit_amount: BIT_AMOUNT.default,
            bit_mix: BIT_MIX.default,
            drive: DRIVE.default,
            drive_level: DRIVE_LEVEL.default,
            room_size: ROOM_SIZE.default,
            damp: DAMP.default,
            reverb_wet: REVERB_WET.default,
            reverb_dry: REVERB_DRY.default,
            width: WIDTH.default,
            freeze: false,
            invert_direction: false,
            beat_sync: false,
            recording_length: RECORDING_LENGTH.default,
            wet_dry_mix: WET_DRY_MIX.default,
        }
    }
}

impl ParameterSnapshot {
    pub fn band(&self, band: Band) -> &BandSnapshot {
        match band {
            Band::Low => &self.low,
            Band::Mid => &self.mid,
            Band::High => &self.high,
        }
    }

    pub fn band_mut(&mut self, band: Band) -> &mut BandSnapshot {
        match band {
            Band::Low => &mut self.low,
            Band::Mid => &mut self.mid,
            Band::High => &mut self.high,
        }
    }

    /// Every value clamped into its valid range.
    pub fn clamped(self) -> Self {
        ParameterSnapshot {
            low: self.low.clamped(Band::Low),
            mid: self.mid.clamped(Band::Mid),
            high: self.high.clamped(Band::High),
            bit_amount: BIT_AMOUNT.clamp(self.bit_amount),
            bit_mix: BIT_MIX.clamp(self.bit_mix),
            drive: DRIVE.clamp(self.drive),
            drive_level: DRIVE_LEVEL.clamp(self.drive_level),
            room_size: ROOM_SIZE.clamp(self.room_size),
            damp: DAMP.clamp(self.damp),
            reverb_wet: REVERB_WET.clamp(self.reverb_wet),
            reverb_dry: REVERB_DRY.clamp(self.reverb_dry),
            width: WIDTH.clamp(self.width),
            recording_length: RECORDING_LENGTH.clamp(self.recording_length),
            wet_dry_mix: WET_DRY_MIX.clamp(self.wet_dry_mix),
            ..self
        }
    }
}

// ── Atomic store ───────────────────────────────────────────

/// Atomic parameters of one band.
#[derive(Debug)]
pub struct BandParameters {
    range: ParamRange,
    lfo_odd: AtomicF32,
    lfo_even: AtomicF32,
    lfo_link: AtomicBool,
    frequency: AtomicF32,
}

impl BandParameters {
    fn new(band: Band) -> Self {
        let defaults = BandSnapshot::defaults(band);
        BandParameters {
            range: band.frequency_range(),
            lfo_odd: AtomicF32::new(defaults.lfo_odd),
            lfo_even: AtomicF32::new(defaults.lfo_even),
            lfo_link: AtomicBool::new(defaults.lfo_link),
            frequency: AtomicF32::new(defaults.frequency),
        }
    }

    pub fn lfo_odd(&self) -> f32 {
        self.lfo_odd.load()
    }

    pub fn set_lfo_odd(&self, value: f32) {
        self.lfo_odd.store(LFO_AMOUNT.clamp(value));
    }

    pub fn lfo_even(&self) -> f32 {
        self.lfo_even.load()
    }

    pub fn set_lfo_even(&self, value: f32) {
        self.lfo_even.store(LFO_AMOUNT.clamp(value));
    }

    pub fn lfo_link(&self) -> bool {
        self.lfo_link.load(Ordering::Relaxed)
    }

    pub fn set_lfo_link(&self, linked: bool) {
        self.lfo_link.store(linked, Ordering::Relaxed);
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.load()
    }

    pub fn set_frequency(&self, hz: f32) {
        self.frequency.store(self.range.clamp(hz));
    }

    fn snapshot(&self) -> BandSnapshot {
        BandSnapshot {
            lfo_odd: self.lfo_odd(),
            lfo_even: self.lfo_even(),
            lfo_link: self.lfo_link(),
            frequency: self.frequency(),
        }
    }

    fn load(&self, values: &BandSnapshot) {
        self.set_lfo_odd(values.lfo_odd);
        self.set_lfo_even(values.lfo_even);
        self.set_lfo_link(values.lfo_link);
        self.set_frequency(values.frequency);
    }
}

/// Lock-free parameter store, shared through `Arc`.
#[derive(Debug)]
pub struct Parameters {
    low: BandParameters,
    mid: BandParameters,
    high: BandParameters,

    bit_amount: AtomicF32,
    bit_mix: AtomicF32,
    drive: AtomicF32,
    drive_level: AtomicF32,
    room_size: AtomicF32,
    damp: AtomicF32,
    reverb_wet: AtomicF32,
    reverb_dry: AtomicF32,
    width: AtomicF32,
    recording_length: AtomicF32,
    wet_dry_mix: AtomicF32,

    freeze: AtomicBool,
    invert_direction: AtomicBool,
    beat_sync: AtomicBool,
}

macro_rules! float_params {
    ($($field:ident, $setter:ident, $range:ident;)*) => {
        impl Parameters {
            $(
                pub fn $field(&self) -> f32 {
                    self.$field.load()
                }

                pub fn $setter(&self, value: f32) {
                    self.$field.store($range.clamp(value));
                }
            )*
        }
    };
}

macro_rules! bool_params {
    ($($field:ident, $setter:ident;)*) => {
        impl Parameters {
            $(
                pub fn $field(&self) -> bool {
                    self.$field.load(Ordering::Relaxed)
                }

                pub fn $setter(&self, value: bool) {
                    self.$field.store(value, Ordering::Relaxed);
                }
            )*
        }
    };
}

float_params! {
    bit_amount, set_bit_amount, BIT_AMOUNT;
    bit_mix, set_bit_mix, BIT_MIX;
    drive, set_drive, DRIVE;
    drive_level, set_drive_level, DRIVE_LEVEL;
    room_size, set_room_size, ROOM_SIZE;
    damp, set_damp, DAMP;
    reverb_wet, set_reverb_wet, REVERB_WET;
    reverb_dry, set_reverb_dry, REVERB_DRY;
    width, set_width, WIDTH;
    recording_length, set_recording_length, RECORDING_LENGTH;
    wet_dry_mix, set_wet_dry_mix, WET_DRY_MIX;
}

bool_params! {
    freeze, set_freeze;
    invert_direction, set_invert_direction;
    beat_sync, set_beat_sync;
}

impl Parameters {
    pub fn new() -> Self {
        Self::from_snapshot(&ParameterSnapshot::default())
    }

    pub fn from_snapshot(values: &ParameterSnapshot) -> Self {
        let values = values.clamped();
        let params = Parameters {
            low: BandParameters::new(Band::Low),
            mid: BandParameters::new(Band::Mid),
            high: BandParameters::new(Band::High),
            bit_amount: AtomicF32::new(values.bit_amount),
            bit_mix: AtomicF32::new(values.bit_mix),
            drive: AtomicF32::new(values.drive),
            drive_level: AtomicF32::new(values.drive_level),
            room_size: AtomicF32::new(values.room_size),
            damp: AtomicF32::new(values.damp),
            reverb_wet: AtomicF32::new(values.reverb_wet),
            reverb_dry: AtomicF32::new(values.reverb_dry),
            width: AtomicF32::new(values.width),
            recording_length: AtomicF32::new(values.recording_length),
            wet_dry_mix: AtomicF32::new(values.wet_dry_mix),
            freeze: AtomicBool::new(values.freeze),
            invert_direction: AtomicBool::new(values.invert_direction),
            beat_sync: AtomicBool::new(values.beat_sync),
        };
        for band in Band::ALL {
            params.band(band).load(values.band(band));
        }
        params
    }

    pub fn band(&self, band: Band) -> &BandParameters {
        match band {
            Band::Low => &self.low,
            Band::Mid => &self.mid,
            Band::High => &self.high,
        }
    }

    /// Read every parameter once.
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            low: self.low.snapshot(),
            mid: self.mid.snapshot(),
            high: self.high.snapshot(),
            bit_amount: self.bit_amount(),
            bit_mix: self.bit_mix(),
            drive: self.drive(),
            drive_level: self.drive_level(),
            room_size: self.room_size(),
            damp: self.damp(),
            reverb_wet: self.reverb_wet(),
            reverb_dry: self.reverb_dry(),
            width: self.width(),
            freeze: self.freeze(),
            invert_direction: self.invert_direction(),
            beat_sync: self.beat_sync(),
            recording_length: self.recording_length(),
            wet_dry_mix: self.wet_dry_mix(),
        }
    }

    /// Store every value of `values`, clamped.
    pub fn load(&self, values: &ParameterSnapshot) {
        for band in Band::ALL {
            self.band(band).load(values.band(band));
        }
        self.set_bit_amount(values.bit_amount);
        self.set_bit_mix(values.bit_mix);
        self.set_drive(values.drive);
        self.set_drive_level(values.drive_level);
        self.set_room_size(values.room_size);
        self.set_damp(values.damp);
        self.set_reverb_wet(values.reverb_wet);
        self.set_reverb_dry(values.reverb_dry);
        self.set_width(values.width);
        self.set_freeze(values.freeze);
        self.set_invert_direction(values.invert_direction);
        self.set_beat_sync(values.beat_sync);
        self.set_recording_length(values.recording_length);
        self.set_wet_dry_mix(values.wet_dry_mix);
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}
