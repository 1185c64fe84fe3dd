//! Vector field of the driver/follower network.
//!
//! The driver is the generalized Rössler R5 oscillator. Its affine-scaled output
//! is routed, together with the followers' own states, through two 11-element
//! index spaces (Channel A carries the followers' first states, Channel B their
//! second states). Each follower receives one coupling term from each channel,
//! switched on by a step gate at `t = 1`.

use crate::error::SimulationResult;
use crate::layout::{
    check_state_len, first, second, DRIVER_DIM, FOLLOWER_COUNT, STATE_DIM,
};
use crate::params::ParameterSet;
use crate::traits::{DynamicalSystem, Linearized, Scalar};

/// Time at which the coupling gate opens.
pub const COUPLING_ONSET: f64 = 1.0;

/// Restoring coefficient of every follower: `dx2 = -5 x1 + input`.
pub const FOLLOWER_STIFFNESS: f64 = 5.0;

pub const CHANNEL_LEN: usize = DRIVER_DIM + FOLLOWER_COUNT;

/// Number of labelled coupling scalars `c1..=c12`.
pub const COUPLING_COUNT: usize = 2 * FOLLOWER_COUNT;

/// Labels `(first input, second input)` feeding each follower.
/// Follower 5 takes `c12` first and `c11` second.
pub const FOLLOWER_INPUT_LABELS: [(usize, usize); FOLLOWER_COUNT] =
    [(1, 2), (3, 4), (5, 6), (7, 8), (9, 10), (12, 11)];

fn lit<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap()
}

/// Step gate: `1` from [`COUPLING_ONSET`] on (inclusive), `0` before.
pub fn gate<T: Scalar>(t: T) -> T {
    if t >= lit(COUPLING_ONSET) {
        T::one()
    } else {
        T::zero()
    }
}

/// Driver output used for coupling: `amp * x + ofs`, element-wise.
pub fn coupling_signal<T: Scalar>(params: &ParameterSet, driver: &[T]) -> [T; DRIVER_DIM] {
    let amp = lit::<T>(params.amp);
    let ofs = lit::<T>(params.ofs);
    let mut out = [T::zero(); DRIVER_DIM];
    for (slot, &x) in out.iter_mut().zip(driver) {
        *slot = amp * x + ofs;
    }
    out
}

/// One of the two 11-element coupling index spaces.
///
/// Positions are 1-based in [`Channel::u`]: `u(1)..u(5)` is the driver's
/// coupling signal, `u(6)..u(11)` the selected state of followers 0..5.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel<T> {
    values: [T; CHANNEL_LEN],
}

impl<T: Scalar> Channel<T> {
    /// Channel A: signal followed by each follower's first state.
    pub fn first_states(signal: &[T; DRIVER_DIM], x: &[T]) -> Self {
        Self::assemble(signal, x, first)
    }

    /// Channel B: signal followed by each follower's second state.
    pub fn second_states(signal: &[T; DRIVER_DIM], x: &[T]) -> Self {
        Self::assemble(signal, x, second)
    }

    fn assemble(signal: &[T; DRIVER_DIM], x: &[T], index: fn(usize) -> usize) -> Self {
        let mut values = [T::zero(); CHANNEL_LEN];
        values[..DRIVER_DIM].copy_from_slice(signal);
        for i in 0..FOLLOWER_COUNT {
            values[DRIVER_DIM + i] = x[index(i)];
        }
        Self { values }
    }

    pub fn u(&self, position: usize) -> T {
        self.values[position - 1]
    }

    /// The six coupling expressions evaluated on this channel, in follower order.
    pub fn terms(&self) -> [T; FOLLOWER_COUNT] {
        let u = |p: usize| self.u(p);
        [
            -(u(1) * u(6)) + u(1) * u(8),
            u(2) * u(8) - u(2) * u(7),
            u(6) * u(1) + u(7) * u(2) + u(9) * u(3) - (u(1) + u(2) + u(3)) * u(8),
            u(8) * u(3) + u(10) * u(4) + u(11) * u(5) - (u(3) + u(4) + u(5)) * u(9),
            u(9) * u(4) - u(4) * u(10),
            u(5) * u(9) - u(5) * u(11),
        ]
    }
}

/// Labelled coupling scalars; `c[k - 1]` holds `ck`.
///
/// Odd labels come from Channel A and even labels from Channel B, except for
/// the last follower where `c11` is the Channel B term and `c12` the Channel A term.
pub fn coupling_scalars<T: Scalar>(a: &Channel<T>, b: &Channel<T>) -> [T; COUPLING_COUNT] {
    let ta = a.terms();
    let tb = b.terms();
    [
        ta[0], tb[0], ta[1], tb[1], ta[2], tb[2], ta[3], tb[3], ta[4], tb[4], tb[5], ta[5],
    ]
}

/// Gated, scaled `(input1, input2)` for every follower.
pub fn follower_inputs<T: Scalar>(
    t: T,
    gain: T,
    scalars: &[T; COUPLING_COUNT],
) -> [(T, T); FOLLOWER_COUNT] {
    let scale = gate(t) * gain;
    let mut inputs = [(T::zero(), T::zero()); FOLLOWER_COUNT];
    for (slot, &(l1, l2)) in inputs.iter_mut().zip(FOLLOWER_INPUT_LABELS.iter()) {
        *slot = (scale * scalars[l1 - 1], scale * scalars[l2 - 1]);
    }
    inputs
}

fn driver_field<T: Scalar>(params: &ParameterSet, x: &[T], out: &mut [T]) {
    let a = lit::<T>(params.a);
    let b = lit::<T>(params.b);
    let d = lit::<T>(params.d);
    let e = lit::<T>(params.e);

    out[0] = a * x[0] - x[1];
    out[1] = x[0] - x[2];
    out[2] = x[1] - x[3];
    out[3] = x[2] - x[4];
    out[4] = e + b * x[4] * (x[3] - d);
}

fn driver_jacobian(params: &ParameterSet, x: &[f64], out: &mut [f64]) {
    let n = DRIVER_DIM;
    out[..n * n].iter_mut().for_each(|v| *v = 0.0);
    out[0] = params.a;
    out[1] = -1.0;
    out[n] = 1.0;
    out[n + 2] = -1.0;
    out[2 * n + 1] = 1.0;
    out[2 * n + 3] = -1.0;
    out[3 * n + 2] = 1.0;
    out[3 * n + 4] = -1.0;
    out[4 * n + 3] = params.b * x[4];
    out[4 * n + 4] = params.b * (x[3] - params.d);
}

/// The standalone five-equation driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverSystem {
    params: ParameterSet,
}

impl DriverSystem {
    pub fn new(params: ParameterSet) -> Self {
        Self { params }
    }
}

impl<T: Scalar> DynamicalSystem<T> for DriverSystem {
    fn dimension(&self) -> usize {
        DRIVER_DIM
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        driver_field(&self.params, x, out);
    }
}

impl Linearized for DriverSystem {
    fn jacobian(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        driver_jacobian(&self.params, x, out);
    }
}

/// The full 17-dimensional driver/follower network.
#[derive(Debug, Clone, Copy)]
pub struct CoupledNetwork {
    params: ParameterSet,
}

impl CoupledNetwork {
    pub fn new(params: ParameterSet) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }
}

impl<T: Scalar> DynamicalSystem<T> for CoupledNetwork {
    fn dimension(&self) -> usize {
        STATE_DIM
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        debug_assert_eq!(x.len(), STATE_DIM);
        driver_field(&self.params, &x[..DRIVER_DIM], &mut out[..DRIVER_DIM]);

        let signal = coupling_signal(&self.params, &x[..DRIVER_DIM]);
        let channel_a = Channel::first_states(&signal, x);
        let channel_b = Channel::second_states(&signal, x);
        let scalars = coupling_scalars(&channel_a, &channel_b);
        let inputs = follower_inputs(t, lit(self.params.k), &scalars);

        let stiffness = lit::<T>(FOLLOWER_STIFFNESS);
        for (i, &(input1, input2)) in inputs.iter().enumerate() {
            out[first(i)] = x[second(i)] + input1;
            out[second(i)] = -stiffness * x[first(i)] + input2;
        }
    }
}

/// Evaluates the network's rate of change at `(t, state)`.
pub fn derivative(
    t: f64,
    state: &[f64],
    params: &ParameterSet,
) -> SimulationResult<[f64; STATE_DIM]> {
    check_state_len(state.len())?;
    let mut out = [0.0; STATE_DIM];
    CoupledNetwork::new(*params).apply(t, state, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use crate::layout::{assemble, initial_state};

    fn synthetic_state() -> [f64; STATE_DIM] {
        assemble(
            &[0.5, -1.5, 2.0, 0.75, 5.0],
            &[
                [2.0, 3.0],
                [-1.0, 0.5],
                [7.0, 4.0],
                [3.0, -2.0],
                [-4.0, 1.25],
                [1.0, 6.0],
            ],
        )
    }

    #[test]
    fn gate_is_inclusive_at_onset() {
        assert_eq!(gate(0.0_f64), 0.0);
        assert_eq!(gate(0.999_999_f64), 0.0);
        assert_eq!(gate(1.0_f64), 1.0);
        assert_eq!(gate(25.0_f64), 1.0);
        assert_eq!(gate(-3.0_f64), 0.0);
    }

    #[test]
    fn derivative_is_deterministic() {
        let params = ParameterSet::default();
        let state = synthetic_state();
        for &t in &[0.3, 1.0, 17.25, 1.0, 0.3] {
            let first_eval = derivative(t, &state, &params).expect("valid state");
            let second_eval = derivative(t, &state, &params).expect("valid state");
            assert_eq!(first_eval, second_eval);
        }
    }

    #[test]
    fn followers_are_uncoupled_before_onset() {
        let params = ParameterSet::default().with_coupling_gain(50.0);
        let state = synthetic_state();
        let rates = derivative(0.999, &state, &params).expect("valid state");
        for i in 0..FOLLOWER_COUNT {
            assert_eq!(rates[first(i)], state[second(i)]);
            assert_eq!(rates[second(i)], -FOLLOWER_STIFFNESS * state[first(i)]);
        }
    }

    #[test]
    fn coupling_switches_on_at_onset() {
        let params = ParameterSet::default().with_coupling_gain(2.0);
        let state = synthetic_state();
        let rates = derivative(1.0, &state, &params).expect("valid state");

        // u(1) = 0.2 * 0.5 + 1 = 1.1
        // c1 = 1.1 * (x1_2 - x1_0) = 1.1 * 5, c2 = 1.1 * (x2_2 - x2_0) = 1.1
        assert!((rates[first(0)] - (3.0 + 2.0 * 5.5)).abs() < 1e-12);
        assert!((rates[second(0)] - (-10.0 + 2.0 * 1.1)).abs() < 1e-12);
    }

    #[test]
    fn last_follower_takes_c12_first_and_c11_second() {
        let params = ParameterSet::default();
        let state = synthetic_state();
        let signal = coupling_signal(&params, &state[..DRIVER_DIM]);
        let a = Channel::first_states(&signal, &state);
        let b = Channel::second_states(&signal, &state);

        // u(5) = 0.2 * 5 + 1 = 2 on both channels.
        assert_eq!(a.u(9), 3.0);
        assert_eq!(a.u(11), 1.0);
        assert_eq!(b.u(9), -2.0);
        assert_eq!(b.u(11), 6.0);

        let scalars = coupling_scalars(&a, &b);
        assert!((scalars[11] - 4.0).abs() < 1e-12);
        assert!((scalars[10] + 16.0).abs() < 1e-12);

        let rates = derivative(2.0, &state, &params).expect("valid state");
        assert!((rates[first(5)] - (6.0 + 4.0)).abs() < 1e-12);
        assert!((rates[second(5)] - (-5.0 - 16.0)).abs() < 1e-12);
    }

    #[test]
    fn channels_pick_the_right_follower_states() {
        let params = ParameterSet::default();
        let state = synthetic_state();
        let signal = coupling_signal(&params, &state[..DRIVER_DIM]);
        let a = Channel::first_states(&signal, &state);
        let b = Channel::second_states(&signal, &state);
        for k in 0..DRIVER_DIM {
            assert_eq!(a.u(k + 1), signal[k]);
            assert_eq!(b.u(k + 1), signal[k]);
        }
        for i in 0..FOLLOWER_COUNT {
            assert_eq!(a.u(DRIVER_DIM + i + 1), state[first(i)]);
            assert_eq!(b.u(DRIVER_DIM + i + 1), state[second(i)]);
        }
    }

    #[test]
    fn driver_ignores_follower_states() {
        let params = ParameterSet::default();
        let base = initial_state();
        let mut perturbed = base;
        for value in perturbed[DRIVER_DIM..].iter_mut() {
            *value *= -3.0;
        }
        let lhs = derivative(4.0, &base, &params).expect("valid state");
        let rhs = derivative(4.0, &perturbed, &params).expect("valid state");
        assert_eq!(lhs[..DRIVER_DIM], rhs[..DRIVER_DIM]);

        let mut driver_out = [0.0; DRIVER_DIM];
        DriverSystem::new(params).apply(4.0_f64, &base[..DRIVER_DIM], &mut driver_out[..]);
        assert_eq!(lhs[..DRIVER_DIM], driver_out);
    }

    #[test]
    fn derivative_rejects_wrong_length() {
        let params = ParameterSet::default();
        let result = derivative(0.0, &[0.0; 5], &params);
        assert!(matches!(
            result,
            Err(SimulationError::InvalidStateSize {
                expected: 17,
                actual: 5
            })
        ));
    }

    #[test]
    fn single_precision_tracks_double_precision() {
        let params = ParameterSet::default();
        let state = synthetic_state();
        let state32: Vec<f32> = state.iter().map(|&v| v as f32).collect();
        let network = CoupledNetwork::new(params);

        let mut out64 = [0.0_f64; STATE_DIM];
        let mut out32 = [0.0_f32; STATE_DIM];
        network.apply(3.0_f64, &state[..], &mut out64[..]);
        network.apply(3.0_f32, &state32[..], &mut out32[..]);
        for (a, b) in out64.iter().zip(out32.iter()) {
            assert!((a - *b as f64).abs() < 1e-4 * (1.0 + a.abs()));
        }
    }

    #[test]
    fn driver_jacobian_matches_finite_differences() {
        let params = ParameterSet::default();
        let system = DriverSystem::new(params);
        let x = [0.3, -0.2, 0.9, 1.4, 0.6];
        let mut jac = [0.0; DRIVER_DIM * DRIVER_DIM];
        system.jacobian(0.0, &x, &mut jac);

        let h = 1e-6;
        for j in 0..DRIVER_DIM {
            let mut xp = x;
            let mut xm = x;
            xp[j] += h;
            xm[j] -= h;
            let mut fp = [0.0; DRIVER_DIM];
            let mut fm = [0.0; DRIVER_DIM];
            system.apply(0.0_f64, &xp[..], &mut fp[..]);
            system.apply(0.0_f64, &xm[..], &mut fm[..]);
            for i in 0..DRIVER_DIM {
                let fd = (fp[i] - fm[i]) / (2.0 * h);
                assert!((jac[i * DRIVER_DIM + j] - fd).abs() < 1e-6);
            }
        }
    }
}
