//! The insertion search.
//!
//! A request is answered in stages: capacity feasibility picks the slots
//! of every vehicle ([`capacity_simulation`]), routing fetches every leg
//! duration those slots need in a handful of batched queries, and the
//! evaluators price each way of splicing the request into each slot. The
//! cheapest candidate per boarding point and time wins.

mod blacklist;
pub(crate) mod booking;
mod capacity;
mod case;
mod config;
mod durations;
pub(crate) mod evaluate;
pub(crate) mod matrix;
mod pair;
mod request;
pub(crate) mod select;
mod service;
mod slots;

use crate::routing::RoutingError;
use crate::store::StoreError;

pub use blacklist::viable_boarding_points;
pub use booking::{BookedStops, BookingPlan, DirectUpdate, LegPatch, NewEvent, plan_booking};
pub use capacity::{Range, capacity_simulation, is_valid};
pub use case::{
    InsertDirection, InsertHow, InsertWhat, InsertWhere, InsertionCase, can_case_be_valid,
    is_case_valid,
};
pub use config::DispatchConfig;
pub use durations::{allowed_operation_times, arrival_window};
pub use evaluate::{EvaluationContext, SingleEvaluation, SingleInsertions};
pub use evaluate::{evaluate_new_tours, evaluate_single_insertions};
pub use matrix::{RoutingPlan, RoutingResults, route};
pub use pair::{ScheduledTimes, evaluate_pair_insertions};
pub use request::{
    BoardingPoint, DispatchRequest, PromisedTimes, evaluate_request, evaluation_interval,
    single_time,
};
pub use select::{CandidateGrid, Cost, Insertion, compute_cost, take_best};
pub use service::{
    BlacklistRequest, BlacklistResponse, BookingOutcome, BookingRequest, DispatchService,
    WhitelistRequest, WhitelistResponse,
};
pub use slots::{InsertionRanges, InsertionSlot, iterate_slots};

/// Errors from answering a request.
///
/// A request nobody can serve is not an error; it yields empty cells.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The request failed validation
    #[error("invalid {field}: {message}")]
    InvalidRequest { field: String, message: String },

    #[error("routing failed: {0}")]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::InvalidRequest {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may evaluate again and retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Store(e) => e.is_retryable(),
            DispatchError::Routing(e) => e.is_transient(),
            _ => false,
        }
    }
}
