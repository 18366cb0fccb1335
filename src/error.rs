//! Errors that can occur while setting up or running a propagation.

use crate::fpr;
use std::io;
use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type PropagationResult<T> = Result<T, PropagationError>;

/// Errors produced while configuring or running a propagation.
///
/// - `NumericalDivergence` is fatal only to the particle being stepped.
/// - `InvalidConfiguration` is fatal at setup, before any particle is emitted.
/// - `ResourceExhaustion` causes the offending branch to be dropped.
#[derive(Debug, Error)]
pub enum PropagationError {
    #[error(
        "Numerical divergence: step length {step_length:e} m is at the floor but the \
         normalized error is still {error:e} after {attempts} attempts"
    )]
    NumericalDivergence {
        step_length: fpr,
        error: fpr,
        attempts: u32,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Resource exhaustion: {particles} particles in branch exceeds the cap of {cap}")]
    ResourceExhaustion { particles: usize, cap: usize },
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl PropagationError {
    /// Creates an `InvalidConfiguration` error with the given message.
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

/// Returns an `InvalidConfiguration` error with the given message unless the condition holds.
pub fn ensure<S: Into<String>>(condition: bool, message: S) -> PropagationResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PropagationError::invalid(message))
    }
}
