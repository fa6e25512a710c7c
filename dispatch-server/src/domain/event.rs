//! Pickup and dropoff events as seen by the dispatcher.

use chrono::{DateTime, Duration, Utc};

use super::{Capacities, Coordinates, EventId, Interval, RequestId, TourId};

/// One pickup or dropoff of a booked request.
///
/// Events are read from a snapshot and never mutated during evaluation.
/// The owning tour's `departure`/`arrival` are copied onto every event so
/// evaluators can reason about tour boundaries without a second lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub request: RequestId,
    pub tour: TourId,
    pub is_pickup: bool,
    pub coordinates: Coordinates,
    /// Window in which the vehicle is planned to be at the stop.
    pub scheduled: Interval,
    /// Time promised to the passenger.
    pub communicated: DateTime<Utc>,
    /// Demand of the owning request (always non-negative).
    pub demand: Capacities,
    /// Driving time from the previous stop (or the depot) to this one.
    pub prev_leg: Duration,
    /// Driving time from this stop to the next one (or the depot).
    pub next_leg: Duration,
    /// Events at the same stop and moment share a group.
    pub event_group: String,
    /// Departure of the owning tour from the depot.
    pub departure: DateTime<Utc>,
    /// Arrival of the owning tour back at the depot.
    pub arrival: DateTime<Utc>,
    /// For the first event of a tour: driving time from the last event of
    /// the vehicle's preceding tour. `None` when unknown or not first.
    pub direct_duration: Option<Duration>,
}

impl Event {
    /// Signed load change: `+demand` at a pickup, `-demand` at a dropoff.
    pub fn delta(&self) -> Capacities {
        if self.is_pickup { self.demand } else { -self.demand }
    }

    /// The scheduled moment other passengers care about: the latest pickup
    /// time, or the earliest dropoff time.
    pub fn scheduled_time(&self) -> DateTime<Utc> {
        if self.is_pickup {
            self.scheduled.end()
        } else {
            self.scheduled.start()
        }
    }

    /// Number of passengers boarding (pickup) or alighting (dropoff).
    pub fn passengers(&self) -> i32 {
        self.demand.passengers
    }

    /// The owning tour as an interval.
    pub fn tour_span(&self) -> Interval {
        Interval::new(self.departure, self.arrival)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;

    #[test]
    fn delta_sign_follows_kind() {
        let pickup = event(1, 1, true, at(9, 0));
        let dropoff = event(2, 1, false, at(9, 30));
        assert_eq!(pickup.delta().passengers, 1);
        assert_eq!(dropoff.delta().passengers, -1);
    }

    #[test]
    fn scheduled_time_picks_relevant_edge() {
        let mut pickup = event(1, 1, true, at(9, 0));
        pickup.scheduled = crate::domain::Interval::new(at(8, 50), at(9, 0));
        assert_eq!(pickup.scheduled_time(), at(9, 0));

        let mut dropoff = event(2, 1, false, at(9, 30));
        dropoff.scheduled = crate::domain::Interval::new(at(9, 30), at(9, 40));
        assert_eq!(dropoff.scheduled_time(), at(9, 30));
    }
}
