//! Persistence collaborator: snapshot reads and serialized booking commits.
//!
//! The dispatcher evaluates optimistically against a [`SnapshotReader`]
//! snapshot and hands the chosen [`BookingPlan`]s to a [`BookingWriter`],
//! which rejects them if the vehicle changed in the meantime. A trip of
//! several legs is planned leg by leg against a [`StagedSnapshot`] that
//! already holds the earlier legs, then committed in one go.

mod file;
pub(crate) mod memory;
mod timeline;

use std::future::Future;

use crate::dispatch::BookingPlan;
use crate::domain::{Capacities, Company, Coordinates, EventId, Interval, RequestId, TourId, VehicleId};

pub use file::{SnapshotFile, load_snapshot, save_snapshot};
pub use memory::{
    CompanyRecord, EventRecord, MemoryStore, Records, RequestRecord, TourRecord, VehicleRecord,
};
pub use timeline::{Bucket, BucketState};

/// What a snapshot read needs to know about a request.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotQuery {
    /// Companies must cover this point with their zone.
    pub user_chosen: Coordinates,
    /// Eligibility is reported per boarding point, in this order.
    pub bus_stops: Vec<Coordinates>,
    pub required: Capacities,
    /// Availabilities overlapping this interval are read.
    pub availability: Interval,
    /// Tours overlapping this interval are read.
    pub tours: Interval,
}

/// Identifiers created by a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingReceipt {
    pub request: RequestId,
    pub tour: TourId,
    pub pickup: EventId,
    pub dropoff: EventId,
}

/// Companies as they would look once some pending plans are committed.
#[derive(Debug, Clone)]
pub struct StagedSnapshot {
    pub companies: Vec<Company>,
    /// First id a commit following the pending plans hands out.
    pub next_id: u64,
}

/// Errors from the snapshot store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The vehicle was booked by someone else since the snapshot was taken
    #[error("vehicle {vehicle} changed since revision {expected} (now {actual})")]
    Conflict {
        vehicle: VehicleId,
        expected: u64,
        actual: u64,
    },

    /// Ids were handed out since the plan was staged, so the ids it
    /// refers to are no longer the ones it was made against
    #[error("store moved on since the plan was staged (ids from {expected}, now {actual})")]
    Stale { expected: u64, actual: u64 },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot parse error: {message}")]
    Parse { message: String },
}

impl StoreError {
    /// Whether evaluating again against a fresh snapshot may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Stale { .. })
    }
}

/// Reads the companies that could serve a request.
pub trait SnapshotReader: Send + Sync {
    fn companies(
        &self,
        query: &SnapshotQuery,
    ) -> impl Future<Output = Result<Vec<Company>, StoreError>> + Send;

    /// Like [`companies`](Self::companies), as if `pending` had been
    /// committed in order.
    fn companies_after(
        &self,
        query: &SnapshotQuery,
        pending: &[BookingPlan],
    ) -> impl Future<Output = Result<StagedSnapshot, StoreError>> + Send;
}

/// Commits bookings, one batch at a time.
pub trait BookingWriter: Send + Sync {
    /// Apply `plans` in order. Either all of them are committed or none.
    fn commit(
        &self,
        plans: Vec<BookingPlan>,
    ) -> impl Future<Output = Result<Vec<BookingReceipt>, StoreError>> + Send;
}
