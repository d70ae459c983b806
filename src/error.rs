use std::fmt;

/// Errors raised while configuring the processor.
///
/// The audio path never produces one of these; numeric faults during
/// processing are absorbed by clamping and silence substitution.
#[derive(Debug)]
pub enum DopplerError {
    InvalidSampleRate { value: f64 },
    InvalidBlockSize { value: usize },
    InvalidChannelCount { value: usize },
    InvalidCrossfade { ms: f32 },
    InvalidFreezeTimeout { secs: f32 },
    Json(serde_json::Error),
}

impl fmt::Display for DopplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DopplerError::InvalidSampleRate { value } => {
                write!(f, "Invalid sample rate {value}, expected a positive finite value")
            }
            DopplerError::InvalidBlockSize { value } => {
                write!(f, "Invalid block size {value}, expected at least one sample")
            }
            DopplerError::InvalidChannelCount { value } => {
                write!(f, "Invalid channel count {value}, expected at least one channel")
            }
            DopplerError::InvalidCrossfade { ms } => {
                write!(f, "Invalid crossfade duration {ms} ms")
            }
            DopplerError::InvalidFreezeTimeout { secs } => {
                write!(f, "Invalid reverb freeze timeout {secs} s")
            }
            DopplerError::Json(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for DopplerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DopplerError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DopplerError {
    fn from(e: serde_json::Error) -> Self {
        DopplerError::Json(e)
    }
}
