//! Enumeration of insertion slots.
//!
//! Every evaluator and the routing coordinator walk the same slots in the
//! same order: companies, then vehicles, then each feasible [`Range`], then
//! each slot of the range. The position in that walk (`counter`) indexes
//! the per-slot routing results and single-leg evaluations.

use crate::domain::{Capacities, Company, Event, Vehicle};

use super::capacity::{Range, capacity_simulation};

/// Feasible ranges per company, per vehicle.
#[derive(Debug, Clone, Default)]
pub struct InsertionRanges(Vec<Vec<Vec<Range>>>);

impl InsertionRanges {
    pub fn compute(companies: &[Company], required: &Capacities) -> Self {
        Self(
            companies
                .iter()
                .map(|company| {
                    company
                        .vehicles
                        .iter()
                        .map(|v| capacity_simulation(&v.capacities, required, &v.events))
                        .collect()
                })
                .collect(),
        )
    }

    pub fn of(&self, company_idx: usize, vehicle_idx: usize) -> &[Range] {
        self.0
            .get(company_idx)
            .and_then(|vehicles| vehicles.get(vehicle_idx))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of slots across all ranges.
    pub fn slot_count(&self) -> usize {
        self.0
            .iter()
            .flatten()
            .flatten()
            .map(|r| r.slots().count())
            .sum()
    }
}

/// One candidate slot.
#[derive(Debug, Clone, Copy)]
pub struct InsertionSlot<'a> {
    pub company_idx: usize,
    pub company: &'a Company,
    pub vehicle: &'a Vehicle,
    /// The range this slot belongs to.
    pub range: Range,
    /// Insert before `vehicle.events[idx]`.
    pub idx: usize,
    /// Position in the global walk.
    pub counter: usize,
}

impl<'a> InsertionSlot<'a> {
    pub fn prev(&self) -> Option<&'a Event> {
        self.vehicle.prev_of(self.idx)
    }

    pub fn next(&self) -> Option<&'a Event> {
        self.vehicle.next_of(self.idx)
    }
}

/// Walk every slot of every range of every vehicle.
pub fn iterate_slots<'a>(
    companies: &'a [Company],
    ranges: &'a InsertionRanges,
) -> impl Iterator<Item = InsertionSlot<'a>> + 'a {
    companies
        .iter()
        .enumerate()
        .flat_map(move |(company_idx, company)| {
            company
                .vehicles
                .iter()
                .enumerate()
                .flat_map(move |(vehicle_idx, vehicle)| {
                    ranges
                        .of(company_idx, vehicle_idx)
                        .iter()
                        .flat_map(move |range| {
                            range.slots().map(move |idx| (company_idx, company, vehicle, *range, idx))
                        })
                })
        })
        .enumerate()
        .map(|(counter, (company_idx, company, vehicle, range, idx))| InsertionSlot {
            company_idx,
            company,
            vehicle,
            range,
            idx,
            counter,
        })
}
