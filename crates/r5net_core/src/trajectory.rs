use crate::layout::{first, second, DRIVER_DIM, FOLLOWER_COUNT, STATE_DIM};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    /// Right-hand-side evaluations, including initial step selection.
    pub evaluations: usize,
}

/// Sampled time series produced by the integration driver.
///
/// `times[k]` pairs with `states[k]`. Samples sit on the report grid; the
/// solver's own end point is kept separately in `final_time`/`final_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub dimension: usize,
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
    pub final_time: f64,
    pub final_state: Vec<f64>,
    pub stats: IntegrationStats,
}

impl Trajectory {
    pub(crate) fn start(t0: f64, initial_state: &[f64], capacity: usize) -> Self {
        Self {
            dimension: initial_state.len(),
            times: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
            final_time: t0,
            final_state: initial_state.to_vec(),
            stats: IntegrationStats::default(),
        }
    }

    pub(crate) fn push(&mut self, t: f64, state: Vec<f64>) {
        debug_assert_eq!(state.len(), self.dimension);
        self.times.push(t);
        self.states.push(state);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn sample(&self, index: usize) -> Option<(f64, &[f64])> {
        let t = *self.times.get(index)?;
        let state = self.states.get(index)?;
        Some((t, state.as_slice()))
    }

    /// One state component across all samples, `None` past the state width.
    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.dimension).then(|| self.states.iter().map(|row| row[index]).collect())
    }

    /// Driver component `k` (0-based, `x1..x5`) of a network trajectory.
    pub fn driver(&self, k: usize) -> Option<Vec<f64>> {
        if k >= DRIVER_DIM {
            return None;
        }
        self.column(k)
    }

    /// `(x1_i, x2_i)` columns of follower `i` of a network trajectory.
    pub fn follower(&self, i: usize) -> Option<(Vec<f64>, Vec<f64>)> {
        if i >= FOLLOWER_COUNT || self.dimension != STATE_DIM {
            return None;
        }
        Some((self.column(first(i))?, self.column(second(i))?))
    }
}

#[cfg(test)]
mod tests {
    use super::Trajectory;
    use crate::layout::{initial_state, STATE_DIM};

    #[test]
    fn accessors_follow_state_layout() {
        let y0 = initial_state();
        let mut traj = Trajectory::start(0.0, &y0, 2);
        traj.push(0.0, y0.to_vec());
        let mut next = y0.to_vec();
        next[16] = 42.0;
        traj.push(0.5, next);

        assert_eq!(traj.len(), 2);
        assert_eq!(traj.driver(0), Some(vec![0.1, 0.1]));
        let (x1, x2) = traj.follower(5).expect("network trajectory");
        assert_eq!(x1, vec![-5.0, -5.0]);
        assert_eq!(x2, vec![11.0, 42.0]);
        assert!(traj.follower(6).is_none());
        assert_eq!(traj.column(STATE_DIM - 1), Some(vec![11.0, 42.0]));
        assert!(traj.column(STATE_DIM).is_none());
        assert_eq!(traj.sample(1).map(|(t, s)| (t, s.len())), Some((0.5, STATE_DIM)));
        assert!(traj.sample(2).is_none());
    }

    #[test]
    fn follower_accessor_requires_network_width() {
        let traj = Trajectory::start(0.0, &[1.0, 2.0, 3.0, 4.0, 5.0], 0);
        assert!(traj.is_empty());
        assert!(traj.follower(0).is_none());
        assert_eq!(traj.driver(4), Some(Vec::new()));
    }
}
