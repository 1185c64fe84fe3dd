//! Driver Lyapunov spectrum runner.

use crate::system::WasmNetwork;
use js_sys::Float64Array;
use r5net_core::analysis::{driver_lyapunov_exponents, kaplan_yorke, LyapunovStepper};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl WasmNetwork {
    /// Lyapunov exponents of the isolated driver started from the first five
    /// entries of `start_state`.
    pub fn compute_driver_lyapunov_exponents(
        &self,
        start_state: Vec<f64>,
        start_time: f64,
        steps: u32,
        dt: f64,
        qr_stride: u32,
        solver_name: &str,
    ) -> Result<Float64Array, JsValue> {
        let solver = match solver_name {
            "rk4" => LyapunovStepper::Rk4,
            "dopri5" => LyapunovStepper::DormandPrince,
            _ => return Err(JsValue::from_str("Unknown solver")),
        };
        let stride = if qr_stride == 0 {
            1
        } else {
            qr_stride as usize
        };
        let driver = start_state.get(..5).ok_or_else(|| {
            JsValue::from_str("Start state must contain at least the five driver states.")
        })?;

        let exponents = driver_lyapunov_exponents(
            self.network.params(),
            solver,
            driver,
            start_time,
            steps as usize,
            dt,
            stride,
        )
        .map_err(|e| JsValue::from_str(&format!("Lyapunov computation failed: {}", e)))?;

        Ok(Float64Array::from(exponents.as_slice()))
    }
}

#[wasm_bindgen]
pub fn lyapunov_dimension(exponents: Vec<f64>) -> f64 {
    kaplan_yorke(&exponents)
}
