use crate::trajectory::Trajectory;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    /// A state vector did not match the layout it was handed to.
    #[error("State vector has {actual} elements; expected {expected}.")]
    InvalidStateSize { expected: usize, actual: usize },

    /// The adaptive solver gave up. `partial` holds every sample recorded
    /// before the failure point.
    #[error("Integration failed: {message}")]
    IntegrationFailure {
        message: String,
        partial: Box<Trajectory>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SimulationError {
    pub fn partial_trajectory(&self) -> Option<&Trajectory> {
        match self {
            SimulationError::IntegrationFailure { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;
