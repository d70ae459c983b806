//! Band router. Splits each channel into three bands, runs every band
//! through its own effect chain and sums the bands back against the dry
//! signal.

use std::sync::Arc;

use tracing::{debug, info};

use super::bitcrusher::BitCrusher;
use super::doppler::DopplerEffect;
use super::filter::{BiquadFilter, FilterType};
use super::oscillator::rate_from_normalized;
use super::reverb::{Reverb, STEREO_SPREAD};
use super::waveshaper::WaveShaper;
use crate::config::EngineConfig;
use crate::error::DopplerError;
use crate::params::{Band, ParameterSnapshot, Parameters};
use crate::transport::{TransportState, TransportTracker};

fn filter_type(band: Band) -> FilterType {
    match band {
        Band::Low => FilterType::Lowpass,
        Band::Mid => FilterType::Bandpass,
        Band::High => FilterType::Highpass,
    }
}

/// One band of one channel: Doppler → filter → shaper → crusher → reverb.
#[derive(Debug, Clone)]
struct BandChain {
    band: Band,
    doppler: DopplerEffect,
    filter: BiquadFilter,
    shaper: Option<WaveShaper>,
    crusher: Option<BitCrusher>,
    reverb: Option<Reverb>,
    scratch: Vec<f32>,
}

impl BandChain {
    fn new(band: Band, channel: usize, config: &EngineConfig) -> Self {
        let sample_rate = config.sample_rate as f32;

        let mut doppler = DopplerEffect::new(sample_rate, config.block_size);
        doppler.set_interpolation(config.interpolation);
        doppler.set_priming_mode(config.priming);
        doppler.set_resync_mode(config.resync);
        doppler.set_rate_smoothing(config.smooth_rate);
        doppler.set_crossfade_ms(config.crossfade_ms);

        let reverb = (config.routing.reverb == Some(band)).then(|| {
            let mut reverb = Reverb::new(sample_rate, channel * STEREO_SPREAD);
            reverb.set_freeze_timeout(config.freeze_timeout_secs);
            reverb
        });

        BandChain {
            band,
            doppler,
            filter: BiquadFilter::new(
                filter_type(band),
                config.sample_rate,
                band.frequency_range().default as f64,
            ),
            shaper: (config.routing.wave_shaper == Some(band)).then(WaveShaper::default),
            crusher: (config.routing.bit_crusher == Some(band)).then(BitCrusher::default),
            reverb,
            scratch: vec![0.0; config.block_size],
        }
    }

    fn apply_parameters(&mut self, channel: usize, values: &ParameterSnapshot) {
        let band = values.band(self.band);

        let rate = rate_from_normalized(band.lfo_for_channel(channel));
        self.doppler.set_properties(rate, values.invert_direction);
        self.doppler.set_beat_sync(values.beat_sync);
        self.doppler.set_recording_length(values.recording_length);
        self.filter.set_frequency(band.frequency as f64);

        if let Some(shaper) = &mut self.shaper {
            shaper.set_amount(values.drive);
            shaper.set_level(values.drive_level);
        }
        if let Some(crusher) = &mut self.crusher {
            crusher.set_amount(values.bit_amount);
            crusher.set_output_mix(values.bit_mix);
        }
        if let Some(reverb) = &mut self.reverb {
            reverb.set_room_size(values.room_size);
            reverb.set_damp(values.damp);
            reverb.set_wet(values.reverb_wet);
            reverb.set_dry(values.reverb_dry);
            reverb.set_width(values.width);
            reverb.set_freeze(values.freeze);
        }
    }

    /// Run the first `len` scratch samples through the chain.
    fn run(&mut self, len: usize) {
        let buf = &mut self.scratch[..len];
        self.doppler.apply(buf);
        self.filter.apply(buf);
        if let Some(shaper) = &mut self.shaper {
            shaper.apply(buf);
        }
        if let Some(crusher) = &mut self.crusher {
            crusher.apply(buf);
        }
        if let Some(reverb) = &mut self.reverb {
            reverb.apply(buf);
        }
    }

    fn reset(&mut self) {
        self.doppler.reset();
        self.filter.reset();
        if let Some(reverb) = &mut self.reverb {
            reverb.mute();
        }
    }
}

/// The exclusively owned processing state of one channel.
#[derive(Debug, Clone)]
struct ChannelChain {
    index: usize,
    bands: [BandChain; 3],
}

impl ChannelChain {
    fn new(index: usize, config: &EngineConfig) -> Self {
        ChannelChain {
            index,
            bands: Band::ALL.map(|band| BandChain::new(band, index, config)),
        }
    }

    /// Process at most one configured block in place.
    fn process(&mut self, samples: &mut [f32], mix: f32) {
        let len = samples.len();
        for band in &mut self.bands {
            band.scratch[..len].copy_from_slice(samples);
            band.run(len);
        }

        let [low, mid, high] = &self.bands;
        for (i, s) in samples.iter_mut().enumerate() {
            let wet = low.scratch[i] + mid.scratch[i] + high.scratch[i];
            *s = *s * (1.0 - mix) + wet * mix;
        }
    }
}

/// The multi-band Doppler processor.
///
/// Owns one processing chain per configured channel. Parameters are read from
/// the shared [`Parameters`] once at the start of every block.
#[derive(Debug)]
pub struct Processor {
    config: EngineConfig,
    params: Arc<Parameters>,
    applied: Option<ParameterSnapshot>,
    channels: Vec<ChannelChain>,
    transport: TransportTracker,
}

impl Processor {
    pub fn new(config: EngineConfig) -> Result<Self, DopplerError> {
        Self::with_parameters(config, Arc::new(Parameters::new()))
    }

    /// Build a processor reading from an existing parameter store.
    pub fn with_parameters(
        config: EngineConfig,
        params: Arc<Parameters>,
    ) -> Result<Self, DopplerError> {
        config.validate()?;
        let mut processor = Processor {
            config,
            params,
            applied: None,
            channels: Vec::new(),
            transport: TransportTracker::new(),
        };
        processor.allocate();
        Ok(processor)
    }

    /// Handle to the parameter store for the control thread.
    pub fn parameters(&self) -> Arc<Parameters> {
        Arc::clone(&self.params)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Reconfigure for a new sample rate and block size.
    ///
    /// Reallocates and resets every buffer. Not real-time safe.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) -> Result<(), DopplerError> {
        let config = EngineConfig {
            sample_rate,
            block_size,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        self.allocate();
        Ok(())
    }

    fn allocate(&mut self) {
        self.channels = (0..self.config.channels)
            .map(|index| ChannelChain::new(index, &self.config))
            .collect();
        self.applied = None;
        self.transport.clear();
        info!(
            sample_rate = self.config.sample_rate,
            block_size = self.config.block_size,
            channels = self.config.channels,
            "prepared doppler processor"
        );
    }

    /// Clear every record buffer and filter state and restart the LFOs.
    pub fn reset(&mut self) {
        for chain in &mut self.channels {
            for band in &mut chain.bands {
                band.reset();
            }
        }
    }

    /// Restart every LFO at phase 0, keeping recorded audio.
    pub fn reset_oscillators(&mut self) {
        for chain in &mut self.channels {
            for band in &mut chain.bands {
                band.doppler.reset_oscillator();
            }
        }
    }

    /// Reverb tail plus the deepest Doppler look-back, in seconds.
    ///
    /// `None` while a reverb is frozen: the tail never ends.
    pub fn tail_length_secs(&self) -> Option<f32> {
        let sample_rate = self.config.sample_rate as f32;
        let mut tail = 0.0f32;
        for band in self.channels.iter().flat_map(|c| &c.bands) {
            let look_back = band.doppler.min_required(band.doppler.direction()) as f32;
            let reverb = match &band.reverb {
                Some(reverb) => reverb.tail_length_secs()?,
                None => 0.0,
            };
            tail = tail.max(look_back / sample_rate + reverb);
        }
        Some(tail)
    }

    fn apply_snapshot(&mut self) -> f32 {
        let values = self.params.snapshot();
        if self.applied.as_ref() != Some(&values) {
            if self.applied.is_some_and(|prev| prev.freeze != values.freeze) {
                debug!(freeze = values.freeze, "reverb freeze requested");
            }
            for chain in &mut self.channels {
                for band in &mut chain.bands {
                    band.apply_parameters(chain.index, &values);
                }
            }
            self.applied = Some(values);
        }
        values.wet_dry_mix
    }

    fn process_channel(&mut self, index: usize, samples: &mut [f32], mix: f32) {
        let block_size = self.config.block_size;
        if let Some(chain) = self.channels.get_mut(index) {
            for chunk in samples.chunks_mut(block_size) {
                chain.process(chunk, mix);
            }
        }
    }

    /// Process per-channel slices in place.
    ///
    /// Channels beyond the configured count are left untouched.
    pub fn process(&mut self, channels: &mut [&mut [f32]]) {
        let mix = self.apply_snapshot();
        for (index, samples) in channels.iter_mut().enumerate() {
            self.process_channel(index, samples, mix);
        }
    }

    /// Process one planar buffer (channel after channel) in place.
    pub fn process_planar(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let frames = buffer.len() / channels;
        if frames == 0 {
            return;
        }
        let mix = self.apply_snapshot();
        for (index, samples) in buffer.chunks_exact_mut(frames).enumerate() {
            self.process_channel(index, samples, mix);
        }
    }

    /// Poll the transport, then process.
    ///
    /// A stopped→playing edge or a tempo change resets every record buffer
    /// and LFO; tempo changes also update the beat length.
    pub fn process_with_transport(&mut self, channels: &mut [&mut [f32]], state: TransportState) {
        self.update_transport(state);
        self.process(channels);
    }

    /// Apply a transport poll without processing audio.
    pub fn update_transport(&mut self, state: TransportState) {
        let change = self.transport.update(state);
        if change.tempo_changed {
            let samples_per_beat = state.samples_per_beat(self.config.sample_rate);
            for chain in &mut self.channels {
                for band in &mut chain.bands {
                    band.doppler.set_samples_per_beat(samples_per_beat);
                }
            }
            debug!(tempo = state.tempo, ?samples_per_beat, "tempo changed");
        }
        if change.needs_reset() {
            debug!(started = change.started, "transport reset");
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::reverb::ReverbMode;

    fn config() -> EngineConfig {
        EngineConfig::new(8000.0, 64, 2)
    }

    fn sine(len: usize, step: f32) -> Vec<f32> {
        (0..len).map(|n| (n as f32 * step).sin() * 0.5).collect()
    }

    #[test]
    fn fully_dry_mix_is_identity() {
        let mut processor = Processor::new(config()).unwrap();
        processor.parameters().set_wet_dry_mix(0.0);

        let input = sine(640, 0.07);
        let mut left = input.clone();
        let mut right = input.clone();
        for _ in 0..3 {
            left.copy_from_slice(&input);
            right.copy_from_slice(&input);
            processor.process(&mut [&mut left[..], &mut right[..]]);
        }
        assert_eq!(left, input);
        assert_eq!(right, input);
    }

    #[test]
    fn extra_channels_pass_through() {
        let mut processor = Processor::new(EngineConfig::new(8000.0, 64, 1)).unwrap();
        let mut first = sine(128, 0.1);
        let mut second = sine(128, 0.2);
        let untouched = second.clone();
        processor.process(&mut [&mut first[..], &mut second[..]]);
        assert_eq!(second, untouched);
    }

    #[test]
    fn planar_matches_per_channel() {
        let input_l = sine(256, 0.05);
        let input_r = sine(256, 0.13);

        let mut split = Processor::new(config()).unwrap();
        let mut planar = Processor::new(config()).unwrap();

        let mut l = input_l.clone();
        let mut r = input_r.clone();
        split.process(&mut [&mut l[..], &mut r[..]]);

        let mut buffer: Vec<f32> = input_l.iter().chain(&input_r).copied().collect();
        planar.process_planar(&mut buffer, 2);

        assert_eq!(&buffer[..256], &l[..]);
        assert_eq!(&buffer[256..], &r[..]);
    }

    #[test]
    fn long_host_blocks_are_chunked() {
        let mut processor = Processor::new(config()).unwrap();
        let mut block = sine(1000, 0.02);
        let mut other = sine(1000, 0.03);
        processor.process(&mut [&mut block[..], &mut other[..]]);
        assert!(block.iter().chain(&other).all(|s| s.is_finite()));
    }

    #[test]
    fn routing_places_effects() {
        let processor = Processor::new(config()).unwrap();
        let chain = &processor.channels[1];
        assert!(chain.bands[Band::Low.index()].crusher.is_some());
        assert!(chain.bands[Band::Low.index()].shaper.is_some());
        assert!(chain.bands[Band::Mid.index()].reverb.is_some());
        assert!(chain.bands[Band::High.index()].reverb.is_none());
        assert_eq!(
            chain.bands[Band::High.index()].filter.filter_type(),
            FilterType::Highpass
        );
    }

    #[test]
    fn parameters_reach_the_chains() {
        let mut processor = Processor::new(config()).unwrap();
        let params = processor.parameters();
        params.band(Band::High).set_lfo_odd(1.0);
        params.band(Band::High).set_lfo_even(0.0);
        params.band(Band::High).set_lfo_link(false);
        params.set_invert_direction(true);

        let mut l = vec![0.0; 64];
        let mut r = vec![0.0; 64];
        processor.process(&mut [&mut l[..], &mut r[..]]);

        let high = Band::High.index();
        let first = &processor.channels[0].bands[high].doppler;
        let second = &processor.channels[1].bands[high].doppler;
        assert!((first.lfo_rate() - 10.0).abs() < 1e-6);
        assert_eq!(second.lfo_rate(), 0.0);
        assert_eq!(first.direction(), crate::dsp::doppler::Direction::Inverted);
    }

    #[test]
    fn freeze_reaches_reverbs_and_stops_the_tail_estimate() {
        let config = EngineConfig {
            freeze_timeout_secs: 0.0,
            ..config()
        };
        let mut processor = Processor::new(config).unwrap();
        assert!(processor.tail_length_secs().is_some());

        processor.parameters().set_freeze(true);
        let mut l = vec![0.1; 64];
        let mut r = vec![0.1; 64];
        processor.process(&mut [&mut l[..], &mut r[..]]);

        let mid = Band::Mid.index();
        for chain in &processor.channels {
            let mode = chain.bands[mid].reverb.as_ref().map(Reverb::mode);
            assert_eq!(mode, Some(ReverbMode::Frozen));
        }
        assert!(processor.tail_length_secs().is_none());
    }

    #[test]
    fn transport_start_resets_record_buffers() {
        let mut processor = Processor::new(config()).unwrap();
        let stopped = TransportState::default();
        let playing = TransportState {
            playing: true,
            ..stopped
        };

        let mut l = vec![0.2; 128];
        let mut r = vec![0.2; 128];
        processor.process_with_transport(&mut [&mut l[..], &mut r[..]], stopped);
        processor.process_with_transport(&mut [&mut l[..], &mut r[..]], stopped);
        assert!(processor.channels[0].bands[0].doppler.write_position() > 0);

        processor.update_transport(playing);
        let doppler = &processor.channels[0].bands[0].doppler;
        assert_eq!(doppler.write_position(), 0);
        assert!(!doppler.is_primed());
        assert_eq!(doppler.samples_per_beat(), Some(4000)); // 120 bpm at 8 kHz
    }

    #[test]
    fn prepare_reallocates_and_validates() {
        let mut processor = Processor::new(config()).unwrap();
        processor.prepare(16000.0, 32).unwrap();
        assert_eq!(processor.config().block_size, 32);
        assert_eq!(processor.channels[0].bands[0].scratch.len(), 32);

        assert!(processor.prepare(16000.0, 0).is_err());
        assert_eq!(processor.config().block_size, 32);
    }
}
