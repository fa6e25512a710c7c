//! Domain error types.
//!
//! These errors represent validation failures in the domain layer. They
//! are distinct from routing and storage errors.

use super::{InvalidCapacities, InvalidCoordinates, InvalidInterval};

/// Domain-level validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    #[error(transparent)]
    Coordinates(#[from] InvalidCoordinates),

    #[error(transparent)]
    Capacities(#[from] InvalidCapacities),

    #[error(transparent)]
    Interval(#[from] InvalidInterval),

    /// A boarding point has no candidate time
    #[error("boarding point {0} has no candidate times")]
    NoCandidateTimes(usize),
}
