pub mod analysis;
pub mod equilibrium;
pub mod error;
pub mod integrator;
pub mod layout;
pub mod network;
pub mod params;
pub mod solvers;
pub mod trajectory;
/// The `r5net_core` crate simulates a generalized Rössler R5 oscillator (the driver)
/// coupled, after a step gate, into six linear two-state followers.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (vector fields),
///   `Linearized` (analytic Jacobians), `Steppable` (fixed-step solvers).
/// - **Layout / Params**: the 17-element state layout and the immutable `ParameterSet`.
/// - **Network**: the driver and the coupled network vector fields, including the
///   Channel A/B coupling topology.
/// - **Integrator**: adaptive Dormand–Prince driver producing a sampled `Trajectory`.
/// - **Analysis / Equilibrium**: Lyapunov spectrum and equilibria of the driver.
pub mod traits;

pub use error::{SimulationError, SimulationResult};
pub use integrator::{integrate, simulate, simulate_default, simulate_driver, IntegrationOptions};
pub use layout::{initial_state, STATE_DIM};
pub use network::{derivative, CoupledNetwork, DriverSystem};
pub use params::ParameterSet;
pub use trajectory::{IntegrationStats, Trajectory};
