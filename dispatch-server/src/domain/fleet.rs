//! Companies, vehicles and tours as captured in a snapshot.

use chrono::{DateTime, Utc};

use super::{Capacities, CompanyId, Coordinates, Event, Interval, TourId, VehicleId};

/// Start and end of one tour of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TourSpan {
    pub id: TourId,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
}

impl TourSpan {
    pub fn interval(&self) -> Interval {
        Interval::new(self.departure, self.arrival)
    }
}

/// A vehicle with everything the dispatcher needs to plan around it.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub capacities: Capacities,
    /// Merged, sorted and pairwise disjoint.
    pub availabilities: Vec<Interval>,
    /// Tours overlapping the search horizon.
    pub tours: Vec<TourSpan>,
    /// Events of `tours`, sorted by scheduled time.
    pub events: Vec<Event>,
    /// Last event of the closest tour ending before the horizon.
    pub last_event_before: Option<Event>,
    /// First event of the closest tour starting after the horizon.
    pub first_event_after: Option<Event>,
    /// Bumped on every commit touching this vehicle.
    pub revision: u64,
}

impl Vehicle {
    /// A vehicle without tours. Availabilities are merged on construction.
    pub fn new(id: VehicleId, capacities: Capacities, availabilities: &[Interval]) -> Self {
        Self {
            id,
            capacities,
            availabilities: Interval::merge_all(availabilities),
            tours: Vec::new(),
            events: Vec::new(),
            last_event_before: None,
            first_event_after: None,
            revision: 0,
        }
    }

    /// Replace the schedule. Events are sorted by scheduled start and the
    /// tour list is rebuilt from them.
    pub fn with_events(mut self, mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.scheduled.start());
        let mut tours: Vec<TourSpan> = Vec::new();
        for e in &events {
            if !tours.iter().any(|t| t.id == e.tour) {
                tours.push(TourSpan {
                    id: e.tour,
                    departure: e.departure,
                    arrival: e.arrival,
                });
            }
        }
        self.tours = tours;
        self.events = events;
        self
    }

    /// The event preceding insertion slot `slot` (slot `i` sits before
    /// `events[i]`), falling back to the boundary neighbour.
    pub fn prev_of(&self, slot: usize) -> Option<&Event> {
        if slot == 0 {
            self.last_event_before.as_ref()
        } else {
            self.events.get(slot - 1)
        }
    }

    /// The event following insertion slot `slot`.
    pub fn next_of(&self, slot: usize) -> Option<&Event> {
        if slot == self.events.len() {
            self.first_event_after.as_ref()
        } else {
            self.events.get(slot)
        }
    }

    pub fn tour_intervals(&self) -> Vec<Interval> {
        self.tours.iter().map(TourSpan::interval).collect()
    }
}

/// A taxi company: a depot plus its vehicles.
#[derive(Debug, Clone)]
pub struct Company {
    pub id: CompanyId,
    /// Depot location; every tour starts and ends here.
    pub coordinates: Coordinates,
    pub vehicles: Vec<Vehicle>,
    /// Which boarding-point candidates lie in the company's zone, by index.
    /// Empty means every candidate is served.
    pub serves_boarding_points: Vec<bool>,
}

impl Company {
    pub fn serves(&self, boarding_point: usize) -> bool {
        self.serves_boarding_points.is_empty()
            || self.serves_boarding_points.get(boarding_point) == Some(&true)
    }
}
