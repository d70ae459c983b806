//! Host transport state, polled once per block.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportState {
    pub playing: bool,
    /// Beats per minute.
    pub tempo: f64,
    pub time_sig_numerator: u32,
    pub time_sig_denominator: u32,
}

impl Default for TransportState {
    fn default() -> Self {
        TransportState {
            playing: false,
            tempo: 120.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
        }
    }
}

impl TransportState {
    /// Length of one beat in samples, if the tempo is usable.
    pub fn samples_per_beat(&self, sample_rate: f64) -> Option<f64> {
        if !self.tempo.is_finite() || self.tempo <= 0.0 || self.time_sig_denominator == 0 {
            return None;
        }
        Some(sample_rate * 60.0 / self.tempo * 4.0 / self.time_sig_denominator as f64)
    }
}

/// What changed since the previous poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportChange {
    /// Stopped → playing edge.
    pub started: bool,
    /// Tempo or time signature differs from the previous poll.
    pub tempo_changed: bool,
}

impl TransportChange {
    pub fn needs_reset(&self) -> bool {
        self.started || self.tempo_changed
    }
}

/// Detects transport edges between successive polls.
#[derive(Debug, Clone, Default)]
pub struct TransportTracker {
    last: Option<TransportState>,
}

impl TransportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&TransportState> {
        self.last.as_ref()
    }

    pub fn update(&mut self, state: TransportState) -> TransportChange {
        let change = match &self.last {
            None => TransportChange {
                started: state.playing,
                tempo_changed: true,
            },
            Some(prev) => TransportChange {
                started: !prev.playing && state.playing,
                tempo_changed: prev.tempo != state.tempo
                    || prev.time_sig_numerator != state.time_sig_numerator
                    || prev.time_sig_denominator != state.time_sig_denominator,
            },
        };
        self.last = Some(state);
        change
    }

    /// Forget the previous poll; the next one reports a tempo change.
    pub fn clear(&mut self) {
        self.last = None;
    }
}
