use crate::layout::DRIVER_DIM;
use crate::network::DriverSystem;
use crate::params::ParameterSet;
use crate::traits::Linearized;
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverEquilibrium {
    pub state: Vec<f64>,
    pub jacobian: Vec<f64>,
    pub eigenvalues: Vec<Complex<f64>>,
}

impl DriverEquilibrium {
    pub fn is_stable(&self) -> bool {
        self.eigenvalues.iter().all(|l| l.re < 0.0)
    }
}

/// Equilibria of the isolated driver, ordered by `x1`.
///
/// Any equilibrium has `x1 = x3 = x5 = s` and `x2 = x4 = a s`, where `s`
/// solves `a b s^2 - b d s + e = 0`.
pub fn driver_equilibria(params: &ParameterSet) -> Result<Vec<DriverEquilibrium>> {
    let ParameterSet { a, b, d, e, .. } = *params;
    if ![a, b, d, e].iter().all(|v| v.is_finite()) {
        bail!("Driver coefficients must be finite.");
    }

    let roots = quadratic_roots(a * b, -b * d, e)?;
    let system = DriverSystem::new(*params);
    let mut equilibria = Vec::with_capacity(roots.len());
    for s in roots {
        let state = vec![s, a * s, s, a * s, s];
        let mut jacobian = vec![0.0; DRIVER_DIM * DRIVER_DIM];
        system.jacobian(0.0, &state, &mut jacobian);
        let eigenvalues = DMatrix::from_row_slice(DRIVER_DIM, DRIVER_DIM, &jacobian)
            .complex_eigenvalues()
            .iter()
            .copied()
            .collect();
        equilibria.push(DriverEquilibrium {
            state,
            jacobian,
            eigenvalues,
        });
    }
    Ok(equilibria)
}

/// Real roots of `qa s^2 + qb s + qc = 0` in ascending order.
fn quadratic_roots(qa: f64, qb: f64, qc: f64) -> Result<Vec<f64>> {
    if qa == 0.0 {
        if qb == 0.0 {
            if qc == 0.0 {
                bail!("Driver equilibria form a continuum for these parameters.");
            }
            return Ok(Vec::new());
        }
        return Ok(vec![-qc / qb]);
    }

    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return Ok(Vec::new());
    }
    // Avoid cancellation between -qb and sqrt(disc).
    let q = -0.5 * (qb + qb.signum() * disc.sqrt());
    let mut roots = if q == 0.0 {
        vec![0.0]
    } else if disc == 0.0 {
        vec![q / qa]
    } else {
        vec![q / qa, qc / q]
    };
    roots.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::{driver_equilibria, quadratic_roots};
    use crate::network::DriverSystem;
    use crate::params::ParameterSet;
    use crate::traits::DynamicalSystem;

    #[test]
    fn default_driver_has_two_equilibria() {
        let params = ParameterSet::default();
        let equilibria = driver_equilibria(&params).expect("equilibria");
        assert_eq!(equilibria.len(), 2);
        assert!((equilibria[0].state[0] - 0.012_507_822_280_910_5).abs() < 1e-12);
        assert!((equilibria[1].state[0] - 19.987_492_177_719_09).abs() < 1e-9);

        let system = DriverSystem::new(params);
        for eq in &equilibria {
            assert_eq!(eq.eigenvalues.len(), 5);
            let mut rates = [0.0; 5];
            system.apply(0.0_f64, &eq.state[..], &mut rates[..]);
            for r in rates {
                assert!(r.abs() < 1e-10, "residual {r}");
            }
        }
    }

    #[test]
    fn equilibria_are_unstable_in_the_chaotic_regime() {
        let equilibria = driver_equilibria(&ParameterSet::default()).expect("equilibria");
        assert!(equilibria.iter().all(|eq| !eq.is_stable()));
    }

    #[test]
    fn no_equilibria_when_discriminant_is_negative() {
        let params = ParameterSet {
            e: 50.0,
            ..ParameterSet::default()
        };
        assert!(driver_equilibria(&params).expect("equilibria").is_empty());
    }

    #[test]
    fn linear_case_and_continuum() {
        assert_eq!(quadratic_roots(0.0, -2.0, 1.0).expect("roots"), vec![0.5]);
        assert!(quadratic_roots(0.0, 0.0, 1.0).expect("roots").is_empty());
        assert!(quadratic_roots(0.0, 0.0, 0.0).is_err());
        assert_eq!(quadratic_roots(1.0, -2.0, 1.0).expect("roots"), vec![1.0]);
    }
}
