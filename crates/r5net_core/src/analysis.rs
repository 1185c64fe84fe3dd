use crate::layout::DRIVER_DIM;
use crate::network::DriverSystem;
use crate::params::ParameterSet;
use crate::solvers::{DormandPrince45, RK4};
use crate::traits::{DynamicalSystem, Linearized, Steppable};
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LyapunovStepper {
    Rk4,
    DormandPrince,
}

impl LyapunovStepper {
    fn build(self, dim: usize) -> InternalStepper {
        match self {
            LyapunovStepper::Rk4 => InternalStepper::Rk4(RK4::new(dim)),
            LyapunovStepper::DormandPrince => {
                InternalStepper::DormandPrince(DormandPrince45::new(dim))
            }
        }
    }
}

enum InternalStepper {
    Rk4(RK4<f64>),
    DormandPrince(DormandPrince45<f64>),
}

impl InternalStepper {
    fn step(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) {
        match self {
            InternalStepper::Rk4(s) => s.step(system, t, state, dt),
            InternalStepper::DormandPrince(s) => s.step(system, t, state, dt),
        }
    }
}

/// A flow together with its variational equations `dΦ/dt = J(x) Φ`.
///
/// The augmented state is `[x, Φ]` with `Φ` flattened row-major.
struct VariationalSystem<'a, S> {
    inner: &'a S,
    dim: usize,
}

impl<S: Linearized> DynamicalSystem<f64> for VariationalSystem<'_, S> {
    fn dimension(&self) -> usize {
        self.dim + self.dim * self.dim
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let n = self.dim;
        self.inner.apply(t, &x[..n], &mut out[..n]);

        let mut jacobian = vec![0.0; n * n];
        self.inner.jacobian(t, &x[..n], &mut jacobian);

        let phi = &x[n..];
        let phi_dot = &mut out[n..];
        for i in 0..n {
            for j in 0..n {
                let mut acc = 0.0;
                for k in 0..n {
                    acc += jacobian[i * n + k] * phi[k * n + j];
                }
                phi_dot[i * n + j] = acc;
            }
        }
    }
}

/// Lyapunov spectrum of a linearized flow by repeated QR re-orthonormalisation
/// of the tangent map. Exponents come out in QR column order, not sorted.
pub fn lyapunov_exponents<S: Linearized>(
    system: &S,
    solver: LyapunovStepper,
    initial_state: &[f64],
    initial_time: f64,
    steps: usize,
    dt: f64,
    qr_stride: usize,
) -> Result<Vec<f64>> {
    if initial_state.is_empty() {
        bail!("Initial state must have positive dimension.");
    }
    if initial_state.len() != system.dimension() {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            system.dimension(),
            initial_state.len()
        );
    }
    if steps == 0 {
        bail!("Lyapunov computation requires at least one integration step.");
    }
    if dt <= 0.0 {
        bail!("Step size dt must be positive.");
    }
    if qr_stride == 0 {
        bail!("qr_stride must be at least 1.");
    }

    let dim = initial_state.len();
    let aug_dim = dim + dim * dim;
    let mut augmented_state = vec![0.0; aug_dim];
    augmented_state[..dim].copy_from_slice(initial_state);
    for i in 0..dim {
        augmented_state[dim + i * dim + i] = 1.0;
    }

    let variational = VariationalSystem { inner: system, dim };
    let mut stepper = solver.build(aug_dim);
    let mut accum = vec![0.0; dim];
    let mut t = initial_time;
    let mut since_last_qr = 0usize;

    for step in 1..=steps {
        stepper.step(&variational, &mut t, &mut augmented_state, dt);
        since_last_qr += 1;

        if augmented_state[..dim].iter().any(|v| !v.is_finite()) {
            bail!("Trajectory became non-finite at t = {t}.");
        }

        if since_last_qr == qr_stride || step == steps {
            let stretches = reorthonormalize(&mut augmented_state[dim..], dim)?;
            for (total, stretch) in accum.iter_mut().zip(stretches) {
                *total += stretch;
            }
            since_last_qr = 0;
        }
    }

    let total_time = steps as f64 * dt;
    for value in &mut accum {
        *value /= total_time;
    }
    debug!(?accum, total_time, "lyapunov spectrum");

    Ok(accum)
}

/// Lyapunov spectrum of the isolated driver.
pub fn driver_lyapunov_exponents(
    params: &ParameterSet,
    solver: LyapunovStepper,
    initial_driver_state: &[f64],
    initial_time: f64,
    steps: usize,
    dt: f64,
    qr_stride: usize,
) -> Result<Vec<f64>> {
    if initial_driver_state.len() != DRIVER_DIM {
        bail!(
            "Driver state must have {} elements, got {}.",
            DRIVER_DIM,
            initial_driver_state.len()
        );
    }
    lyapunov_exponents(
        &DriverSystem::new(*params),
        solver,
        initial_driver_state,
        initial_time,
        steps,
        dt,
        qr_stride,
    )
}

/// Re-orthonormalizes the row-major tangent matrix in place and returns the
/// log stretch `ln|R_ii|` of each direction since the previous call.
fn reorthonormalize(tangent: &mut [f64], dim: usize) -> Result<Vec<f64>> {
    if tangent.len() != dim * dim {
        bail!("Tangent matrix has {} entries, expected {}.", tangent.len(), dim * dim);
    }
    let qr = DMatrix::from_row_slice(dim, dim, tangent).qr();
    let stretches = qr
        .r()
        .diagonal()
        .iter()
        .map(|d| d.abs())
        .collect::<Vec<_>>();
    if stretches.iter().any(|&d| d <= f64::EPSILON) {
        bail!("Tangent directions collapsed during orthonormalization.");
    }
    // The transpose's column-major storage is Q in row-major order.
    tangent.copy_from_slice(qr.q().transpose().as_slice());
    Ok(stretches.into_iter().map(f64::ln).collect())
}

/// Kaplan–Yorke (Lyapunov) dimension `j + (λ1 + .. + λj) / |λ(j+1)|`, where
/// `j` is the longest prefix of the descending spectrum with a non-negative sum.
pub fn kaplan_yorke(exponents: &[f64]) -> f64 {
    let mut sorted = exponents.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let mut sum = 0.0;
    for (j, &lambda) in sorted.iter().enumerate() {
        if sum + lambda < 0.0 {
            return j as f64 + sum / -lambda;
        }
        sum += lambda;
    }
    sorted.len() as f64
}

#[cfg(test)]
mod tests {
    use super::{
        driver_lyapunov_exponents, kaplan_yorke, lyapunov_exponents, reorthonormalize,
        LyapunovStepper,
    };
    use crate::layout::{DRIVER_DIM, DRIVER_INITIAL};
    use crate::network::DriverSystem;
    use crate::params::ParameterSet;
    use crate::solvers::{DormandPrince45, RK4};
    use crate::traits::{Linearized, Steppable};
    use nalgebra::DMatrix;

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn driver() -> DriverSystem {
        DriverSystem::new(ParameterSet::default())
    }

    /// Time average of the driver's divergence `tr J` along the trajectory the
    /// given stepper produces, by the trapezoid rule.
    fn mean_divergence(stepper: &mut impl Steppable<f64>, steps: usize, dt: f64) -> f64 {
        let system = driver();
        let mut jac = vec![0.0; DRIVER_DIM * DRIVER_DIM];
        let mut trace = |x: &[f64]| {
            system.jacobian(0.0, x, &mut jac);
            (0..DRIVER_DIM).map(|i| jac[i * DRIVER_DIM + i]).sum::<f64>()
        };
        let mut x = DRIVER_INITIAL.to_vec();
        let mut t = 0.0;
        let mut previous = trace(&x);
        let mut integral = 0.0;
        for _ in 0..steps {
            stepper.step(&system, &mut t, &mut x[..], dt);
            let current = trace(&x);
            integral += 0.5 * (previous + current) * dt;
            previous = current;
        }
        integral / (steps as f64 * dt)
    }

    #[test]
    fn rejects_invalid_inputs() {
        let system = driver();
        let run = |state: &[f64], steps: usize, dt: f64, stride: usize| {
            lyapunov_exponents(&system, LyapunovStepper::Rk4, state, 0.0, steps, dt, stride)
        };
        assert_err_contains(run(&[], 10, 0.01, 1), "Initial state");
        assert_err_contains(run(&[0.1, 0.0], 10, 0.01, 1), "dimension mismatch");
        assert_err_contains(run(&DRIVER_INITIAL, 0, 0.01, 1), "at least one integration step");
        assert_err_contains(run(&DRIVER_INITIAL, 10, -0.01, 1), "dt must be positive");
        assert_err_contains(run(&DRIVER_INITIAL, 10, 0.01, 0), "qr_stride");
        assert_err_contains(
            driver_lyapunov_exponents(
                &ParameterSet::default(),
                LyapunovStepper::Rk4,
                &[0.0; 17],
                0.0,
                10,
                0.01,
                1,
            ),
            "Driver state",
        );
    }

    #[test]
    fn driver_spectrum_is_finite_and_dissipative() {
        let exponents = driver_lyapunov_exponents(
            &ParameterSet::default(),
            LyapunovStepper::Rk4,
            &DRIVER_INITIAL,
            0.0,
            2000,
            0.01,
            10,
        )
        .expect("driver spectrum should compute");
        assert_eq!(exponents.len(), DRIVER_DIM);
        assert!(exponents.iter().all(|v| v.is_finite()));
        assert!(exponents.iter().sum::<f64>() < 0.0);
        let dimension = kaplan_yorke(&exponents);
        assert!((0.0..=DRIVER_DIM as f64).contains(&dimension));
    }

    #[test]
    fn spectrum_sum_matches_mean_divergence() {
        // Liouville: the exponents sum to the time-averaged trace of the Jacobian.
        let (steps, dt) = (2000, 0.01);
        let cases: [(LyapunovStepper, f64); 2] = [
            (
                LyapunovStepper::Rk4,
                mean_divergence(&mut RK4::<f64>::new(DRIVER_DIM), steps, dt),
            ),
            (
                LyapunovStepper::DormandPrince,
                mean_divergence(&mut DormandPrince45::<f64>::new(DRIVER_DIM), steps, dt),
            ),
        ];
        for (solver, divergence) in cases {
            let exponents =
                lyapunov_exponents(&driver(), solver, &DRIVER_INITIAL, 0.0, steps, dt, 10)
                    .expect("driver spectrum should compute");
            let sum: f64 = exponents.iter().sum();
            assert!(
                (sum - divergence).abs() < 1e-3,
                "{solver:?}: sum {sum} vs divergence {divergence}"
            );
        }
    }

    #[test]
    fn reorthonormalize_keeps_volume_and_orthonormal_rows() {
        let mut jac = vec![0.0; DRIVER_DIM * DRIVER_DIM];
        driver().jacobian(0.0, &DRIVER_INITIAL, &mut jac);
        // One Euler step of the tangent flow from the identity.
        let tangent = DMatrix::from_row_slice(DRIVER_DIM, DRIVER_DIM, &jac) * 0.1
            + DMatrix::<f64>::identity(DRIVER_DIM, DRIVER_DIM);
        let volume = tangent.determinant().abs().ln();

        let mut flat = tangent.transpose().as_slice().to_vec();
        let stretches = reorthonormalize(&mut flat, DRIVER_DIM).expect("QR should succeed");
        assert!((stretches.iter().sum::<f64>() - volume).abs() < 1e-12);

        let q = DMatrix::from_row_slice(DRIVER_DIM, DRIVER_DIM, &flat);
        let gram = q.transpose() * &q;
        assert!((gram - DMatrix::<f64>::identity(DRIVER_DIM, DRIVER_DIM)).amax() < 1e-12);
    }

    #[test]
    fn reorthonormalize_rejects_collapsed_tangent() {
        let mut flat = vec![0.0; DRIVER_DIM * DRIVER_DIM];
        assert_err_contains(reorthonormalize(&mut flat, DRIVER_DIM), "collapsed");
        assert_err_contains(reorthonormalize(&mut flat[..4], DRIVER_DIM), "entries");
    }

    #[test]
    fn kaplan_yorke_interpolates_into_first_negative_exponent() {
        assert_eq!(kaplan_yorke(&[]), 0.0);
        assert_eq!(kaplan_yorke(&[-0.5, -1.0]), 0.0);
        assert_eq!(kaplan_yorke(&[0.1, 0.2]), 2.0);
        // Order of the input does not matter.
        assert!((kaplan_yorke(&[-2.0, 0.5, 0.0]) - 2.25).abs() < 1e-12);
    }
}
