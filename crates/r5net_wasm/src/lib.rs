pub mod analysis;
pub mod equilibrium;
pub mod system;

use r5net_core::{
    initial_state, simulate as core_simulate, IntegrationOptions, ParameterSet, SimulationError,
    Trajectory,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Mirrors the solver outcome for the page: failures still carry the samples
/// computed before the solver gave up.
#[derive(Serialize)]
pub struct SimulationReport {
    pub success: bool,
    pub message: String,
    pub trajectory: Option<Trajectory>,
}

impl SimulationReport {
    pub fn from_result(result: Result<Trajectory, SimulationError>) -> Self {
        match result {
            Ok(trajectory) => Self {
                success: true,
                message: "Integration reached t_end.".to_string(),
                trajectory: Some(trajectory),
            },
            Err(SimulationError::IntegrationFailure { message, partial }) => Self {
                success: false,
                message,
                trajectory: Some(*partial),
            },
            Err(err) => Self {
                success: false,
                message: err.to_string(),
                trajectory: None,
            },
        }
    }
}

/// Decodes an optional JS object, falling back to `T::default()` for `undefined`/`null`.
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub fn default_parameters() -> Result<JsValue, JsValue> {
    encode(&ParameterSet::default())
}

#[wasm_bindgen]
pub fn default_initial_state() -> Vec<f64> {
    initial_state().to_vec()
}

/// Runs the network from its fixed initial condition (or `initial`, when given)
/// and returns a `SimulationReport`.
#[wasm_bindgen]
pub fn simulate(
    parameters: JsValue,
    options: JsValue,
    initial: Option<Vec<f64>>,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params: ParameterSet = decode_or_default(parameters)?;
    let options: IntegrationOptions = decode_or_default(options)?;
    let start = initial.unwrap_or_else(|| initial_state().to_vec());

    let report = SimulationReport::from_result(core_simulate(&params, &start, &options));
    encode(&report)
}
