//! Stateful network wrapper for interactive stepping.

use crate::{decode_or_default, encode, SimulationReport};
use r5net_core::layout::check_state_len;
use r5net_core::solvers::{DormandPrince45, RK4};
use r5net_core::traits::{DynamicalSystem, Steppable};
use r5net_core::{
    initial_state, integrate, CoupledNetwork, IntegrationOptions, ParameterSet, STATE_DIM,
};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmNetwork {
    pub(crate) network: CoupledNetwork,
    state: Vec<f64>,
    t: f64,
    solver: SolverType,
}

enum SolverType {
    RK4(RK4<f64>),
    DormandPrince(DormandPrince45<f64>),
}

#[wasm_bindgen]
impl WasmNetwork {
    #[wasm_bindgen(constructor)]
    pub fn new(parameters: JsValue, solver_name: &str) -> Result<WasmNetwork, JsValue> {
        console_error_panic_hook::set_once();

        let params: ParameterSet = decode_or_default(parameters)?;
        params
            .validate()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let solver = match solver_name {
            "rk4" => SolverType::RK4(RK4::new(STATE_DIM)),
            "dopri5" => SolverType::DormandPrince(DormandPrince45::new(STATE_DIM)),
            _ => return Err(JsValue::from_str("Unknown solver")),
        };

        Ok(WasmNetwork {
            network: CoupledNetwork::new(params),
            state: initial_state().to_vec(),
            t: params.t_start,
            solver,
        })
    }

    pub fn set_state(&mut self, state: &[f64]) -> Result<(), JsValue> {
        check_state_len(state.len()).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.state = state.to_vec();
        Ok(())
    }

    pub fn get_state(&self) -> Vec<f64> {
        self.state.clone()
    }

    pub fn set_t(&mut self, t: f64) {
        self.t = t;
    }

    pub fn get_t(&self) -> f64 {
        self.t
    }

    pub fn step(&mut self, dt: f64) {
        match &mut self.solver {
            SolverType::RK4(s) => s.step(&self.network, &mut self.t, &mut self.state, dt),
            SolverType::DormandPrince(s) => {
                s.step(&self.network, &mut self.t, &mut self.state, dt)
            }
        }
    }

    /// Rate of change at the current time and state.
    pub fn derivative(&self) -> Vec<f64> {
        let mut out = vec![0.0; STATE_DIM];
        self.network.apply(self.t, &self.state, &mut out);
        out
    }

    /// Adaptive run from the current `(t, state)` to `t_end`, sampled every
    /// `max_step` of the parameter set.
    pub fn integrate_to(&self, t_end: f64, options: JsValue) -> Result<JsValue, JsValue> {
        let options: IntegrationOptions = decode_or_default(options)?;
        let params = self.network.params().with_span(self.t, t_end);
        if let Err(err) = params.validate() {
            return encode(&SimulationReport::from_result(Err(err)));
        }
        let report_times = params.report_times();
        let result = integrate(
            &self.network,
            &self.state,
            self.t,
            t_end,
            &report_times,
            &options,
        );
        encode(&SimulationReport::from_result(result))
    }
}
