use crate::error::{SimulationError, SimulationResult};
use serde::{Deserialize, Serialize};

/// Upper bound on the number of report samples in one run.
pub const MAX_REPORT_SAMPLES: usize = 10_000_000;

/// Physical and coupling constants of one simulation run, plus its time bounds.
///
/// The record is passed by reference into the vector field and the integration
/// driver; nothing mutates it once a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub a: f64,
    pub b: f64,
    pub d: f64,
    pub e: f64,
    /// Global coupling gain.
    #[serde(rename = "K")]
    pub k: f64,
    /// Offset of the driver's coupling signal.
    pub ofs: f64,
    /// Amplitude of the driver's coupling signal.
    pub amp: f64,
    pub t_start: f64,
    pub t_end: f64,
    /// Spacing of the report grid. Unrelated to the solver's internal step.
    pub max_step: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            a: 0.1,
            b: 4.0,
            d: 2.0,
            e: 0.1,
            k: 1.0,
            ofs: 1.0,
            amp: 0.2,
            t_start: 0.0,
            t_end: 30.0,
            max_step: 0.01,
        }
    }
}

impl ParameterSet {
    pub fn with_coupling_gain(self, k: f64) -> Self {
        Self { k, ..self }
    }

    pub fn with_span(self, t_start: f64, t_end: f64) -> Self {
        Self {
            t_start,
            t_end,
            ..self
        }
    }

    pub fn validate(&self) -> SimulationResult<()> {
        let named = [
            ("a", self.a),
            ("b", self.b),
            ("d", self.d),
            ("e", self.e),
            ("K", self.k),
            ("ofs", self.ofs),
            ("amp", self.amp),
            ("t_start", self.t_start),
            ("t_end", self.t_end),
            ("max_step", self.max_step),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(SimulationError::InvalidConfiguration(format!(
                    "parameter {name} must be finite, got {value}"
                )));
            }
        }
        if self.t_end <= self.t_start {
            return Err(SimulationError::InvalidConfiguration(format!(
                "t_end ({}) must exceed t_start ({})",
                self.t_end, self.t_start
            )));
        }
        if self.max_step <= 0.0 {
            return Err(SimulationError::InvalidConfiguration(
                "max_step must be positive".into(),
            ));
        }
        let samples = (self.t_end - self.t_start) / self.max_step;
        if samples > MAX_REPORT_SAMPLES as f64 {
            return Err(SimulationError::InvalidConfiguration(format!(
                "max_step {} yields about {samples:e} report samples; at most {MAX_REPORT_SAMPLES} are allowed",
                self.max_step
            )));
        }
        Ok(())
    }

    /// Evenly spaced sample times from `t_start` up to, but excluding, `t_end`.
    pub fn report_times(&self) -> Vec<f64> {
        report_grid(self.t_start, self.t_end, self.max_step)
    }
}

/// `t_start + k * spacing` for every `k` that stays strictly below `t_end`.
///
/// Empty for a degenerate span or spacing, and for grids longer than
/// [`MAX_REPORT_SAMPLES`].
pub fn report_grid(t_start: f64, t_end: f64, spacing: f64) -> Vec<f64> {
    if spacing.is_nan() || spacing <= 0.0 || t_end.is_nan() || t_end <= t_start {
        return Vec::new();
    }
    let raw = (t_end - t_start) / spacing;
    if !raw.is_finite() || raw > MAX_REPORT_SAMPLES as f64 {
        return Vec::new();
    }
    // Quotients such as 30.0 / 0.01 can land a few ulps above the integer.
    let count = (raw - raw * 1e-12).ceil() as usize;
    (0..count)
        .map(|k| t_start + k as f64 * spacing)
        .filter(|&t| t < t_end)
        .collect()
}
