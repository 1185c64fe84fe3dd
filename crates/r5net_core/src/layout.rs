//! Fixed layout of the network's 17-element state vector.
//!
//! ```text
//! index  0..=4   driver x1..x5
//! index  5 + 2i  follower i, first state  (x1_i)
//! index  6 + 2i  follower i, second state (x2_i)
//! ```
//!
//! Every column of a [`Trajectory`](crate::trajectory::Trajectory) produced for the
//! network follows this order.

use crate::error::{SimulationError, SimulationResult};

pub const DRIVER_DIM: usize = 5;
pub const FOLLOWER_COUNT: usize = 6;
pub const FOLLOWER_DIM: usize = 2;
pub const STATE_DIM: usize = DRIVER_DIM + FOLLOWER_COUNT * FOLLOWER_DIM;

/// Driver initial condition `[x1, x2, x3, x4, x5]`.
pub const DRIVER_INITIAL: [f64; DRIVER_DIM] = [0.1, 0.0, -1.0, 0.0, 1.0];

/// Follower initial conditions as `[x1_i, x2_i]` pairs.
pub const FOLLOWER_INITIAL: [[f64; FOLLOWER_DIM]; FOLLOWER_COUNT] = [
    [10.0, 1.0],
    [-10.0, 2.0],
    [-8.0, 10.0],
    [-3.0, 10.0],
    [-9.0, 8.0],
    [-5.0, 11.0],
];

/// Index of follower `i`'s first state.
pub const fn first(i: usize) -> usize {
    DRIVER_DIM + FOLLOWER_DIM * i
}

/// Index of follower `i`'s second state.
pub const fn second(i: usize) -> usize {
    DRIVER_DIM + FOLLOWER_DIM * i + 1
}

pub fn check_state_len(len: usize) -> SimulationResult<()> {
    if len != STATE_DIM {
        return Err(SimulationError::InvalidStateSize {
            expected: STATE_DIM,
            actual: len,
        });
    }
    Ok(())
}

/// Packs a driver state and six follower pairs into the network layout.
pub fn assemble(
    driver: &[f64; DRIVER_DIM],
    followers: &[[f64; FOLLOWER_DIM]; FOLLOWER_COUNT],
) -> [f64; STATE_DIM] {
    let mut state = [0.0; STATE_DIM];
    state[..DRIVER_DIM].copy_from_slice(driver);
    for (i, pair) in followers.iter().enumerate() {
        state[first(i)] = pair[0];
        state[second(i)] = pair[1];
    }
    state
}

/// The model's fixed initial condition.
pub fn initial_state() -> [f64; STATE_DIM] {
    assemble(&DRIVER_INITIAL, &FOLLOWER_INITIAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follower_indices_interleave_after_driver() {
        assert_eq!(first(0), 5);
        assert_eq!(second(0), 6);
        assert_eq!(first(5), 15);
        assert_eq!(second(5), 16);
        assert_eq!(second(FOLLOWER_COUNT - 1) + 1, STATE_DIM);
    }

    #[test]
    fn initial_state_matches_layout() {
        let state = initial_state();
        assert_eq!(&state[..DRIVER_DIM], &DRIVER_INITIAL);
        assert_eq!((state[first(0)], state[second(0)]), (10.0, 1.0));
        assert_eq!((state[first(3)], state[second(3)]), (-3.0, 10.0));
        assert_eq!((state[first(5)], state[second(5)]), (-5.0, 11.0));
    }

    #[test]
    fn length_check_reports_expected_and_actual() {
        match check_state_len(16) {
            Err(SimulationError::InvalidStateSize { expected, actual }) => {
                assert_eq!(expected, 17);
                assert_eq!(actual, 16);
            }
            other => panic!("expected InvalidStateSize, got {other:?}"),
        }
        assert!(check_state_len(18).is_err());
        assert!(check_state_len(STATE_DIM).is_ok());
    }
}
