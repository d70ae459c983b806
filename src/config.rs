//! Processor configuration.
//!
//! Fixed for the lifetime of a prepared processor; changing any of it goes
//! through `Processor::prepare`, which reallocates every buffer.

use serde::{Deserialize, Serialize};

use crate::dsp::doppler::{DEFAULT_CROSSFADE_MS, Interpolation, PrimingMode, ResyncMode};
use crate::dsp::reverb::DEFAULT_FREEZE_TIMEOUT_SECS;
use crate::error::DopplerError;
use crate::params::Band;

/// Which band each effect is inserted on. `None` disables the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BandRouting {
    pub bit_crusher: Option<Band>,
    pub reverb: Option<Band>,
    pub wave_shaper: Option<Band>,
}

impl Default for BandRouting {
    fn default() -> Self {
        BandRouting {
            bit_crusher: Some(Band::Low),
            reverb: Some(Band::Mid),
            wave_shaper: Some(Band::Low),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Maximum block length the host delivers.
    pub block_size: usize,
    pub channels: usize,
    pub routing: BandRouting,
    /// Output while a record buffer is still priming.
    pub priming: PrimingMode,
    pub resync: ResyncMode,
    pub crossfade_ms: f32,
    pub interpolation: Interpolation,
    /// Smooth the observer speed and Doppler rate.
    pub smooth_rate: bool,
    /// Delay between a freeze request and the tail locking.
    pub freeze_timeout_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            block_size: 512,
            channels: 2,
            routing: BandRouting::default(),
            priming: PrimingMode::default(),
            resync: ResyncMode::default(),
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            interpolation: Interpolation::default(),
            smooth_rate: true,
            freeze_timeout_secs: DEFAULT_FREEZE_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    pub fn new(sample_rate: f64, block_size: usize, channels: usize) -> Self {
        EngineConfig {
            sample_rate,
            block_size,
            channels,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DopplerError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(DopplerError::InvalidSampleRate {
                value: self.sample_rate,
            });
        }
        if self.block_size == 0 {
            return Err(DopplerError::InvalidBlockSize {
                value: self.block_size,
            });
        }
        if self.channels == 0 {
            return Err(DopplerError::InvalidChannelCount {
                value: self.channels,
            });
        }
        if !self.crossfade_ms.is_finite() || self.crossfade_ms < 0.0 {
            return Err(DopplerError::InvalidCrossfade {
                ms: self.crossfade_ms,
            });
        }
        if !self.freeze_timeout_secs.is_finite() || self.freeze_timeout_secs < 0.0 {
            return Err(DopplerError::InvalidFreezeTimeout {
                secs: self.freeze_timeout_secs,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, DopplerError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, DopplerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
