//! DSP blocks of the multi-band Doppler effect.
//!
//! Every block processes one channel and owns its state; the band router in
//! [`mixer`] instantiates them per channel and per band.

pub mod bitcrusher;
pub mod doppler;
pub mod filter;
pub mod interpolator;
pub mod mixer;
pub mod oscillator;
pub mod reverb;
pub mod waveshaper;
