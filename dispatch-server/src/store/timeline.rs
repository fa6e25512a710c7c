//! Per-vehicle occupancy in fixed-width time buckets.

use chrono::Duration;

use crate::domain::{Interval, VehicleId};

use super::memory::Records;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    Free,
    /// Inside a tour, but no passenger on board.
    Reserved,
    /// Some passenger is riding.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub interval: Interval,
    pub state: BucketState,
}

/// Split `range` into buckets of `width` and classify each by the active
/// tours and rides of `vehicle` overlapping it.
pub(super) fn buckets(records: &Records, vehicle: VehicleId, range: Interval, width: Duration) -> Vec<Bucket> {
    let tours: Vec<_> = records
        .tours
        .iter()
        .filter(|t| t.vehicle == vehicle && !t.cancelled)
        .collect();
    let tour_spans: Vec<Interval> = tours.iter().map(|t| Interval::new(t.departure, t.arrival)).collect();
    let rides: Vec<Interval> = tours
        .iter()
        .flat_map(|t| {
            let events = records.tour_events(t);
            events
                .iter()
                .filter(|e| e.is_pickup)
                .filter_map(|pickup| {
                    let dropoff = events
                        .iter()
                        .find(|e| !e.is_pickup && e.request == pickup.request)?;
                    Interval::try_new(pickup.scheduled.start(), dropoff.scheduled.end()).ok()
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut out = Vec::new();
    if width <= Duration::zero() {
        return out;
    }
    let mut start = range.start();
    while start < range.end() {
        let interval = Interval::new(start, (start + width).min(range.end()));
        let state = if rides.iter().any(|r| r.overlaps(&interval)) {
            BucketState::Busy
        } else if tour_spans.iter().any(|t| t.overlaps(&interval)) {
            BucketState::Reserved
        } else {
            BucketState::Free
        };
        out.push(Bucket { interval, state });
        start += width;
    }
    out
}
