use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the network's vector fields.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A continuous-time vector field `dx/dt = f(t, x)`.
///
/// Implementations must be stateless across calls: adaptive solvers evaluate
/// `apply` at revisited and non-monotonic times.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A vector field with an analytic Jacobian.
pub trait Linearized: DynamicalSystem<f64> {
    /// Writes `∂f/∂x` at `(t, x)` into `out` in row-major order (`dim * dim`).
    fn jacobian(&self, t: f64, x: &[f64], out: &mut [f64]);
}

/// A trait for solvers that can step a system forward by a fixed amount.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
