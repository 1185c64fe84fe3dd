//! Driver equilibrium runner.

use crate::encode;
use crate::system::WasmNetwork;
use num_complex::Complex;
use r5net_core::equilibrium::driver_equilibria;
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
struct EquilibriumSummary {
    state: Vec<f64>,
    eigenvalues: Vec<Complex<f64>>,
    stable: bool,
}

#[wasm_bindgen]
impl WasmNetwork {
    pub fn driver_equilibria(&self) -> Result<JsValue, JsValue> {
        let equilibria = driver_equilibria(self.network.params())
            .map_err(|e| JsValue::from_str(&format!("Equilibrium computation failed: {}", e)))?;
        let summaries: Vec<EquilibriumSummary> = equilibria
            .into_iter()
            .map(|eq| EquilibriumSummary {
                stable: eq.is_stable(),
                state: eq.state,
                eigenvalues: eq.eigenvalues,
            })
            .collect();
        encode(&summaries)
    }
}
