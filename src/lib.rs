pub mod config;
pub mod dsp;
pub mod error;
pub mod params;
pub mod transport;

pub use crate::config::{BandRouting, EngineConfig};
pub use crate::dsp::doppler::{Direction, DopplerEffect, Interpolation, PrimingMode, ResyncMode};
pub use crate::dsp::mixer::Processor;
pub use crate::error::DopplerError;
pub use crate::params::{Band, BandSnapshot, ParameterSnapshot, Parameters};
pub use crate::transport::{TransportState, TransportTracker};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the doppler-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed processor for an AudioWorklet.
///
/// Audio is exchanged as one planar `Float32Array` (channel after channel).
#[wasm_bindgen]
pub struct WasmProcessor {
    processor: Processor,
}

#[wasm_bindgen]
impl WasmProcessor {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, block_size: usize, channels: usize) -> Result<WasmProcessor, JsValue> {
        let processor =
            Processor::new(EngineConfig::new(sample_rate, block_size, channels)).map_err(js_error)?;
        Ok(WasmProcessor { processor })
    }

    /// Build from a JSON `EngineConfig`.
    #[wasm_bindgen(js_name = fromConfig)]
    pub fn from_config(json: &str) -> Result<WasmProcessor, JsValue> {
        let config = EngineConfig::from_json(json).map_err(js_error)?;
        let processor = Processor::new(config).map_err(js_error)?;
        Ok(WasmProcessor { processor })
    }

    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) -> Result<(), JsValue> {
        self.processor.prepare(sample_rate, block_size).map_err(js_error)
    }

    /// Process a planar buffer in place.
    pub fn process(&mut self, buffer: &mut [f32], channels: usize) {
        self.processor.process_planar(buffer, channels);
    }

    /// Set parameters from a (possibly partial) parameter object.
    #[wasm_bindgen(js_name = setParameters)]
    pub fn set_parameters(&self, values: JsValue) -> Result<(), JsValue> {
        let values: ParameterSnapshot = serde_wasm_bindgen::from_value(values).map_err(js_error)?;
        self.processor.parameters().load(&values);
        Ok(())
    }

    #[wasm_bindgen(js_name = getParameters)]
    pub fn get_parameters(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.processor.parameters().snapshot()).map_err(js_error)
    }

    #[wasm_bindgen(js_name = setTransport)]
    pub fn set_transport(&mut self, state: JsValue) -> Result<(), JsValue> {
        let state: TransportState = serde_wasm_bindgen::from_value(state).map_err(js_error)?;
        self.processor.update_transport(state);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.processor.reset();
    }

    #[wasm_bindgen(js_name = resetOscillators)]
    pub fn reset_oscillators(&mut self) {
        self.processor.reset_oscillators();
    }

    /// Tail length in seconds; infinity while the reverb is frozen.
    #[wasm_bindgen(js_name = tailLengthSecs)]
    pub fn tail_length_secs(&self) -> f32 {
        self.processor.tail_length_secs().unwrap_or(f32::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn wasm_processor_processes_planar_audio() {
        let mut wasm = WasmProcessor::new(8000.0, 64, 2).unwrap();
        let mut buffer = vec![0.25f32; 256];
        wasm.process(&mut buffer, 2);
        wasm.reset();
        wasm.reset_oscillators();
        assert!(buffer.iter().all(|s| s.is_finite()));
        assert!(wasm.tail_length_secs() > 0.0);
    }
}
