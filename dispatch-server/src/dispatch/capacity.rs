//! Capacity feasibility of insertion slots.
//!
//! Slot `i` of a vehicle sits before `events[i]`; slot `events.len()` sits
//! after the last event. A request can be picked up at slot `i` and
//! dropped off at slot `j > i` iff the vehicle still fits the extra load at
//! every slot from `i` to `j`. Those slots are grouped into [`Range`]s.

use crate::domain::{Capacities, Event};

/// A maximal run of slots that can all carry the extra demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub earliest_pickup: usize,
    pub latest_dropoff: usize,
}

impl Range {
    /// Slots in this range, in order.
    pub fn slots(&self) -> std::ops::RangeInclusive<usize> {
        self.earliest_pickup..=self.latest_dropoff
    }
}

/// Whether a vehicle can carry `required` at all.
pub fn is_valid(vehicle: &Capacities, required: &Capacities) -> bool {
    required.fits_into(vehicle)
}

/// Compute the feasible slot ranges of one vehicle.
///
/// ```
/// use dispatch_server::dispatch::capacity_simulation;
/// use dispatch_server::domain::Capacities;
///
/// // An empty vehicle has a single slot
/// let ranges = capacity_simulation(&Capacities::new(3, 0, 0, 0), &Capacities::new(2, 0, 0, 0), &[]);
/// assert_eq!(ranges.len(), 1);
/// assert_eq!(ranges[0].earliest_pickup, 0);
/// assert_eq!(ranges[0].latest_dropoff, 0);
/// ```
pub fn capacity_simulation(
    vehicle: &Capacities,
    required: &Capacities,
    events: &[Event],
) -> Vec<Range> {
    let mut ranges = Vec::new();
    let mut load = Capacities::default();
    let mut open: Option<usize> = None;

    for slot in 0..=events.len() {
        let feasible = (load + *required).fits_into(vehicle);
        match (feasible, open) {
            (true, None) => open = Some(slot),
            (false, Some(start)) => {
                ranges.push(Range {
                    earliest_pickup: start,
                    latest_dropoff: slot - 1,
                });
                open = None;
            }
            _ => {}
        }
        if let Some(event) = events.get(slot) {
            load = load + event.delta();
        }
    }
    if let Some(start) = open {
        ranges.push(Range {
            earliest_pickup: start,
            latest_dropoff: events.len(),
        });
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::fixtures::*;

    fn with_demand(mut e: Event, passengers: i32) -> Event {
        e.demand = Capacities::new(passengers, 0, 0, 0);
        e
    }

    #[test]
    fn full_vehicle_splits_ranges() {
        // the first ride occupies two of three seats at slot 1
        let events = vec![
            with_demand(event(1, 1, true, at(9, 0)), 2),
            with_demand(event(2, 1, false, at(9, 30)), 2),
            with_demand(event(3, 2, true, at(11, 0)), 1),
            with_demand(event(4, 2, false, at(11, 30)), 1),
        ];
        let ranges = capacity_simulation(
            &Capacities::new(3, 0, 0, 0),
            &Capacities::new(2, 0, 0, 0),
            &events,
        );
        assert_eq!(
            ranges,
            vec![
                Range { earliest_pickup: 0, latest_dropoff: 0 },
                Range { earliest_pickup: 2, latest_dropoff: 4 },
            ]
        );
    }

    #[test]
    fn ranges_span_tours() {
        let events = vec![
            event(1, 1, true, at(9, 0)),
            event(2, 1, false, at(9, 30)),
            event(3, 2, true, at(11, 0)),
            event(4, 2, false, at(11, 30)),
        ];
        let ranges = capacity_simulation(
            &Capacities::new(3, 0, 0, 0),
            &Capacities::new(1, 0, 0, 0),
            &events,
        );
        assert_eq!(ranges, vec![Range { earliest_pickup: 0, latest_dropoff: 4 }]);
        assert_eq!(ranges[0].slots().count(), 5);
    }

    #[test]
    fn luggage_competes_for_free_seats() {
        let events = vec![event(1, 1, true, at(9, 0)), event(2, 1, false, at(9, 30))];
        // 3 seats, no luggage space: one rider plus 2 bags fills it
        let ranges = capacity_simulation(
            &Capacities::new(3, 0, 0, 0),
            &Capacities::new(1, 0, 0, 2),
            &events,
        );
        assert_eq!(
            ranges,
            vec![
                Range { earliest_pickup: 0, latest_dropoff: 0 },
                Range { earliest_pickup: 2, latest_dropoff: 2 },
            ]
        );
    }

    #[test]
    fn too_large_demand_has_no_range() {
        let ranges = capacity_simulation(
            &Capacities::new(3, 0, 0, 0),
            &Capacities::new(1, 1, 0, 0),
            &[],
        );
        assert!(ranges.is_empty());
        assert!(!is_valid(&Capacities::new(3, 0, 0, 0), &Capacities::new(1, 1, 0, 0)));
    }
}
