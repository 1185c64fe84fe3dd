//! Adaptive integration driver.
//!
//! Advances a [`DynamicalSystem`] with the Dormand–Prince 5(4) pair under a
//! mixed relative/absolute tolerance. The solver picks its own internal steps;
//! report samples come from the pair's fourth-order continuous extension, so
//! the report grid never constrains the step size.

use crate::error::{SimulationError, SimulationResult};
use crate::layout::{check_state_len, initial_state};
use crate::network::{CoupledNetwork, DriverSystem};
use crate::params::ParameterSet;
use crate::solvers::DormandPrince45;
use crate::trajectory::{IntegrationStats, Trajectory};
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationOptions {
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    /// Explicit initial step. Chosen automatically when `None`.
    pub first_step: Option<f64>,
    /// Hard lower bound on the internal step. A step that would have to shrink
    /// below it is a failure.
    pub min_step: f64,
    /// Upper bound on the internal step. Unbounded when `None`.
    pub max_internal_step: Option<f64>,
    /// Budget of attempted (accepted plus rejected) steps.
    pub max_steps: usize,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-6,
            absolute_tolerance: 1e-9,
            first_step: None,
            min_step: 0.0,
            max_internal_step: None,
            max_steps: 1_000_000,
        }
    }
}

impl IntegrationOptions {
    pub fn with_tolerances(self, relative_tolerance: f64, absolute_tolerance: f64) -> Self {
        Self {
            relative_tolerance,
            absolute_tolerance,
            ..self
        }
    }

    pub fn validate(&self) -> SimulationResult<()> {
        let invalid = |msg: &str| Err(SimulationError::InvalidConfiguration(msg.to_string()));
        if !self.relative_tolerance.is_finite() || self.relative_tolerance <= 0.0 {
            return invalid("relative_tolerance must be finite and positive");
        }
        if !self.absolute_tolerance.is_finite() || self.absolute_tolerance <= 0.0 {
            return invalid("absolute_tolerance must be finite and positive");
        }
        if let Some(h) = self.first_step {
            if !h.is_finite() || h <= 0.0 {
                return invalid("first_step must be finite and positive");
            }
        }
        if !self.min_step.is_finite() || self.min_step < 0.0 {
            return invalid("min_step must be finite and non-negative");
        }
        if let Some(h) = self.max_internal_step {
            if h.is_nan() || h <= 0.0 || h < self.min_step {
                return invalid("max_internal_step must be positive and at least min_step");
            }
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be greater than zero");
        }
        Ok(())
    }
}

/// Integrates the network from `initial_state` over `[t_start, t_end]` of `params`,
/// sampling on the parameter set's report grid.
pub fn simulate(
    params: &ParameterSet,
    initial_state: &[f64],
    options: &IntegrationOptions,
) -> SimulationResult<Trajectory> {
    check_state_len(initial_state.len())?;
    params.validate()?;
    let network = CoupledNetwork::new(*params);
    let report_times = params.report_times();
    integrate(
        &network,
        initial_state,
        params.t_start,
        params.t_end,
        &report_times,
        options,
    )
}

/// Default parameters, the model's fixed initial condition and default tolerances.
pub fn simulate_default() -> SimulationResult<Trajectory> {
    simulate(
        &ParameterSet::default(),
        &initial_state(),
        &IntegrationOptions::default(),
    )
}

/// Integrates the five driver equations alone on the same grid as [`simulate`].
pub fn simulate_driver(
    params: &ParameterSet,
    driver_state: &[f64],
    options: &IntegrationOptions,
) -> SimulationResult<Trajectory> {
    let system = DriverSystem::new(*params);
    if driver_state.len() != DynamicalSystem::<f64>::dimension(&system) {
        return Err(SimulationError::InvalidStateSize {
            expected: DynamicalSystem::<f64>::dimension(&system),
            actual: driver_state.len(),
        });
    }
    params.validate()?;
    let report_times = params.report_times();
    integrate(
        &system,
        driver_state,
        params.t_start,
        params.t_end,
        &report_times,
        options,
    )
}

/// Integrates `system` from `(t_start, initial_state)` to `t_end`.
///
/// `report_times` must be non-decreasing and lie within `[t_start, t_end]`.
/// On failure the returned error carries every sample recorded so far.
pub fn integrate<S: DynamicalSystem<f64>>(
    system: &S,
    initial_state: &[f64],
    t_start: f64,
    t_end: f64,
    report_times: &[f64],
    options: &IntegrationOptions,
) -> SimulationResult<Trajectory> {
    let dim = system.dimension();
    if initial_state.len() != dim {
        return Err(SimulationError::InvalidStateSize {
            expected: dim,
            actual: initial_state.len(),
        });
    }
    options.validate()?;
    if !t_start.is_finite() || !t_end.is_finite() || t_end <= t_start {
        return Err(SimulationError::InvalidConfiguration(format!(
            "integration span [{t_start}, {t_end}] must be finite and increasing"
        )));
    }
    if report_times.windows(2).any(|w| w[1] < w[0])
        || report_times
            .iter()
            .any(|&t| t.is_nan() || t < t_start || t > t_end)
    {
        return Err(SimulationError::InvalidConfiguration(
            "report times must be sorted and lie within the integration span".into(),
        ));
    }

    info!(
        dimension = dim,
        t_start,
        t_end,
        samples = report_times.len(),
        rtol = options.relative_tolerance,
        atol = options.absolute_tolerance,
        "starting integration"
    );

    let rtol = options.relative_tolerance;
    let atol = options.absolute_tolerance;
    let mut trajectory = Trajectory::start(t_start, initial_state, report_times.len());
    let mut stepper = DormandPrince45::new(dim);
    let mut t = t_start;
    let mut state = initial_state.to_vec();

    stepper.prime(system, t, &state);
    if !all_finite(&state) || !all_finite(stepper.slope()) {
        let stats = IntegrationStats {
            evaluations: stepper.evaluations(),
            ..IntegrationStats::default()
        };
        return Err(failure(
            trajectory,
            t,
            &state,
            stats,
            format!("non-finite state or derivative at t = {t}"),
        ));
    }

    let mut next_report = 0usize;
    while next_report < report_times.len() && report_times[next_report] <= t {
        trajectory.push(report_times[next_report], state.clone());
        next_report += 1;
    }

    let max_h = options.max_internal_step.unwrap_or(f64::INFINITY);
    let (mut h, selection_evals) = match options.first_step {
        Some(h0) => (h0, 0),
        None => initial_step(system, t, &state, stepper.slope(), t_end - t, rtol, atol),
    };
    h = h.min(max_h).max(options.min_step);
    debug!(first_step = h, "selected initial step");

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut attempts = 0usize;
    let mut last_rejected = false;
    let mut saw_non_finite = false;
    let mut sample = vec![0.0; dim];

    while t < t_end {
        let stats = IntegrationStats {
            accepted_steps: accepted,
            rejected_steps: rejected,
            evaluations: stepper.evaluations() + selection_evals,
        };
        if attempts >= options.max_steps {
            return Err(failure(
                trajectory,
                t,
                &state,
                stats,
                format!(
                    "exceeded max_steps = {} at t = {t} before reaching t_end = {t_end}",
                    options.max_steps
                ),
            ));
        }

        let spacing = 10.0 * f64::EPSILON * t.abs();
        if h < options.min_step.max(spacing) {
            let message = if saw_non_finite {
                format!("non-finite state produced near t = {t}; step size collapsed to {h:e}")
            } else if options.min_step > spacing {
                format!(
                    "required step size {h:e} is below min_step = {:e} at t = {t}",
                    options.min_step
                )
            } else {
                format!("required step size {h:e} is less than the spacing of numbers at t = {t}")
            };
            return Err(failure(trajectory, t, &state, stats, message));
        }

        let mut t_new = t + h;
        if t_new > t_end {
            t_new = t_end;
        }
        let step = t_new - t;

        attempts += 1;
        let err = stepper.attempt(system, t, &state, step, rtol, atol);
        let finite = err.is_finite() && all_finite(stepper.candidate());

        if finite && err <= 1.0 {
            let mut factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(ERROR_EXPONENT)).min(MAX_FACTOR)
            };
            if last_rejected {
                factor = factor.min(1.0);
            }

            while next_report < report_times.len() && report_times[next_report] <= t_new {
                let theta = (report_times[next_report] - t) / step;
                stepper.interpolate(&state, step, theta, &mut sample);
                trajectory.push(report_times[next_report], sample.clone());
                next_report += 1;
            }

            stepper.accept(&mut state);
            t = t_new;
            h = (step * factor).min(max_h).max(options.min_step);
            accepted += 1;
            last_rejected = false;
        } else {
            if !finite {
                saw_non_finite = true;
            }
            let factor = if finite {
                (SAFETY * err.powf(ERROR_EXPONENT)).max(MIN_FACTOR)
            } else {
                MIN_FACTOR
            };
            h = step * factor;
            rejected += 1;
            last_rejected = true;
        }
    }

    trajectory.final_time = t;
    trajectory.final_state = state;
    trajectory.stats = IntegrationStats {
        accepted_steps: accepted,
        rejected_steps: rejected,
        evaluations: stepper.evaluations() + selection_evals,
    };

    info!(
        accepted,
        rejected,
        evaluations = trajectory.stats.evaluations,
        samples = trajectory.len(),
        "integration finished"
    );
    Ok(trajectory)
}

fn failure(
    mut partial: Trajectory,
    t: f64,
    state: &[f64],
    stats: IntegrationStats,
    message: String,
) -> SimulationError {
    partial.final_time = t;
    partial.final_state = state.to_vec();
    partial.stats = stats;
    warn!(
        t,
        samples = partial.len(),
        accepted = stats.accepted_steps,
        %message,
        "integration failed"
    );
    SimulationError::IntegrationFailure {
        message,
        partial: Box::new(partial),
    }
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn rms_scaled(values: &[f64], scale: &[f64]) -> f64 {
    let sum: f64 = values
        .iter()
        .zip(scale)
        .map(|(v, s)| (v / s) * (v / s))
        .sum();
    (sum / values.len() as f64).sqrt()
}

/// Hairer–Nørsett–Wanner starting step for a method whose error estimator has order 4.
/// Returns the step and the number of right-hand-side evaluations spent.
fn initial_step<S: DynamicalSystem<f64>>(
    system: &S,
    t0: f64,
    y0: &[f64],
    f0: &[f64],
    span: f64,
    rtol: f64,
    atol: f64,
) -> (f64, usize) {
    let scale: Vec<f64> = y0.iter().map(|y| atol + y.abs() * rtol).collect();
    let d0 = rms_scaled(y0, &scale);
    let d1 = rms_scaled(f0, &scale);
    let h0 = (if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    })
    .min(span);

    let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
    let mut f1 = vec![0.0; y0.len()];
    system.apply(t0 + h0, &y1, &mut f1);
    let diff: Vec<f64> = f1.iter().zip(f0).map(|(a, b)| a - b).collect();
    let d2 = rms_scaled(&diff, &scale) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / 5.0)
    };
    ((100.0 * h0).min(h1).min(span), 1)
}
