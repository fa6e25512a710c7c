//! Pickup and dropoff in different slots of the same vehicle.
//!
//! A pair combines the single evaluation of the pickup at slot `p` with
//! the single evaluation of the dropoff at some later slot `d` of the same
//! feasibility range. Everything between the two slots may have to shift,
//! so the pair cost accounts for the other passengers affected and for
//! tours that become one.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::domain::{Company, Event, Interval};

use super::case::InsertDirection;
use super::config::DispatchConfig;
use super::evaluate::{EvaluationContext, SingleEvaluation, SingleInsertions};
use super::request::PromisedTimes;
use super::select::{CandidateGrid, Cost, Insertion};
use super::slots::{InsertionRanges, iterate_slots};

/// Scheduled windows of the new pickup and dropoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimes {
    pub pickup: Interval,
    pub dropoff: Interval,
}

impl ScheduledTimes {
    /// Place the pickup early in its window and the dropoff late in its
    /// window, each spanning at most its scheduled buffer. Promised times
    /// pin the pickup end and the dropoff start.
    pub fn compute(
        config: &DispatchConfig,
        pickup: &SingleEvaluation,
        dropoff: &SingleEvaluation,
        promised: Option<PromisedTimes>,
    ) -> Option<Self> {
        let pickup_buffer = config.scheduled_buffer_pickup();
        let pickup_end = match promised {
            Some(p) => p.pickup,
            None => (pickup.window.start() + pickup_buffer).min(pickup.window.end()),
        };
        let pickup_start = pickup.window.start().max(pickup_end - pickup_buffer);

        let dropoff_buffer =
            config.scheduled_buffer_dropoff(dropoff.window.start() - pickup.window.end());
        let dropoff_start = match promised {
            Some(p) => p.dropoff,
            None => (dropoff.window.end() - dropoff_buffer).max(dropoff.window.start()),
        };
        let dropoff_end = (dropoff_start + dropoff_buffer).min(dropoff.window.end());

        Some(Self {
            pickup: Interval::try_new(pickup_start, pickup_end).ok()?,
            dropoff: Interval::try_new(dropoff_start, dropoff_end).ok()?,
        })
    }
}

/// Picking up before `events[p]` is pointless when `events[p]` ends a tour
/// and the vehicle cannot reach the next tour's first event in time.
fn is_invalid_pickup_transition(events: &[Event], p: usize) -> bool {
    let (Some(next), Some(after)) = (events.get(p), events.get(p + 1)) else {
        return false;
    };
    if next.tour == after.tour {
        return false;
    }
    match after.direct_duration {
        Some(direct) => after.scheduled.end() - next.scheduled.start() - direct < Duration::zero(),
        None => false,
    }
}

/// Whether the dropoff can still be reached after the pickup when only
/// one or two events lie between them. With more events in between the
/// single evaluations already guarantee it.
fn are_pickup_dropoff_compatible(
    events: &[Event],
    p: usize,
    d: usize,
    times: &ScheduledTimes,
    pickup: &SingleEvaluation,
    dropoff: &SingleEvaluation,
) -> bool {
    if d >= p + 3 {
        return true;
    }
    let mut available = times.dropoff.start()
        - times.pickup.end()
        - dropoff.approach
        - pickup.return_leg;
    if d == p + 2 {
        let (Some(first), Some(second)) = (events.get(p), events.get(p + 1)) else {
            return false;
        };
        let between = if first.tour != second.tour {
            second.direct_duration
        } else {
            Some(second.prev_leg)
        };
        match between {
            Some(between) => available -= between,
            None => return false,
        }
    }
    available >= Duration::zero()
}

/// Driving saved or added by moving the dropoff slot from `d - 1` to `d`:
/// when `events[d - 1]` opens a tour, the vehicle now drives straight into
/// it from the previous tour instead of through the depot. `None` if that
/// drive is unknown, which rules out every later slot too.
fn boundary_driving(events: &[Event], p: usize, d: usize) -> Option<Duration> {
    if d > 1 && d - 1 != p && d != events.len() {
        let (prev, before) = (&events[d - 1], &events[d - 2]);
        if prev.tour != before.tour {
            return Some(prev.direct_duration? - prev.prev_leg - before.next_leg);
        }
    }
    Some(Duration::zero())
}

/// The events around the two slots.
struct Neighbourhood<'a> {
    prev_pickup: Option<&'a Event>,
    two_before_pickup: Option<&'a Event>,
    next_pickup: Option<&'a Event>,
    prev_dropoff: Option<&'a Event>,
    next_dropoff: Option<&'a Event>,
    two_after_dropoff: Option<&'a Event>,
}

impl<'a> Neighbourhood<'a> {
    fn new(events: &'a [Event], p: usize, d: usize) -> Self {
        let before = |i: usize, n: usize| i.checked_sub(n).and_then(|j| events.get(j));
        Self {
            prev_pickup: before(p, 1),
            two_before_pickup: before(p, 2),
            next_pickup: events.get(p),
            prev_dropoff: before(d, 1),
            next_dropoff: events.get(d),
            two_after_dropoff: events.get(d + 1),
        }
    }
}

/// Change in the total length of the affected tours, minus the change in
/// driving: the idle time the pair adds.
fn pair_waiting_time(
    events: &[Event],
    (p, d): (usize, usize),
    pickup: &SingleEvaluation,
    dropoff: &SingleEvaluation,
    times: &ScheduledTimes,
    driving: Duration,
    around: &Neighbourhood<'_>,
) -> Option<Duration> {
    let first = if pickup.case.comes_from_company() {
        p
    } else {
        p.checked_sub(1)?
    };
    let last = if dropoff.case.returns_to_company() {
        d.checked_sub(1)?
    } else {
        d
    };
    let mut seen = HashSet::new();
    let old_total: Duration = events
        .get(first..=last.min(events.len().saturating_sub(1)))
        .unwrap_or_default()
        .iter()
        .filter(|e| seen.insert(e.tour))
        .map(|e| e.arrival - e.departure)
        .sum();

    let new_departure: DateTime<Utc> = if pickup.case.comes_from_company() {
        times.pickup.end() - pickup.approach
    } else {
        let prev = around.prev_pickup?;
        let starts_tour = around.two_before_pickup.is_none_or(|e| e.tour != prev.tour);
        if starts_tour {
            (times.pickup.start() - pickup.approach).min(prev.scheduled_time()) - prev.prev_leg
        } else {
            prev.departure
        }
    };
    let new_arrival: DateTime<Utc> = if dropoff.case.returns_to_company() {
        times.dropoff.start() + dropoff.return_leg
    } else {
        let next = around.next_dropoff?;
        let ends_tour = around.two_after_dropoff.is_none_or(|e| e.tour != next.tour);
        if ends_tour {
            (times.dropoff.end() + dropoff.return_leg).max(next.scheduled_time()) + next.next_leg
        } else {
            next.arrival
        }
    };
    Some(new_arrival - new_departure - old_total - driving)
}

/// Passenger time lost when a stop moves by `by`.
fn shift(passengers: i32, by: Duration) -> Duration {
    by.max(Duration::zero()) * passengers
}

/// Ride time of the new passengers plus the time other passengers gain
/// because their pickup moves earlier or their dropoff later.
fn weighted_passenger_duration(
    passengers: i32,
    pickup: &SingleEvaluation,
    dropoff: &SingleEvaluation,
    times: &ScheduledTimes,
    around: &Neighbourhood<'_>,
) -> Duration {
    let mut total = (times.dropoff.end() - times.pickup.start()) * passengers;
    let legs = [
        (pickup, times.pickup, around.prev_pickup, around.next_pickup),
        (dropoff, times.dropoff, around.prev_dropoff, around.next_dropoff),
    ];
    for (leg, scheduled, prev, next) in legs {
        let prev = prev.filter(|e| e.is_pickup && !leg.case.comes_from_company());
        if let Some(prev) = prev {
            total += shift(
                prev.passengers(),
                prev.scheduled_time() - scheduled.end() + leg.approach,
            );
        }
        let next = next.filter(|e| !e.is_pickup && !leg.case.returns_to_company());
        if let Some(next) = next {
            total += shift(
                next.passengers(),
                scheduled.start() + leg.return_leg - next.scheduled_time(),
            );
        }
    }
    total
}

/// Combine pickups and dropoffs at different slots of one range.
pub fn evaluate_pair_insertions(
    ctx: &EvaluationContext<'_>,
    companies: &[Company],
    ranges: &InsertionRanges,
    singles: &SingleInsertions,
) -> CandidateGrid {
    let config = ctx.config;
    let start_fixed = ctx.direction == InsertDirection::FromBusStop;
    let mut best = CandidateGrid::new(&ctx.shape());

    'pickups: for slot in iterate_slots(companies, ranges) {
        let events = &slot.vehicle.events;
        let p = slot.idx;
        if is_invalid_pickup_transition(events, p) {
            continue;
        }
        let mut cumulated_driving = Duration::zero();
        for d in p + 1..=slot.range.latest_dropoff {
            let Some(delta) = boundary_driving(events, p, d) else {
                continue 'pickups;
            };
            cumulated_driving += delta;

            let around = Neighbourhood::new(events, p, d);
            let dropoff_counter = slot.counter + (d - p);
            for (b, times) in ctx.bus_stop_windows.iter().enumerate() {
                if !slot.company.serves(b) {
                    continue;
                }
                for t in 0..times.len() {
                    let Some(pickup) = singles.leg(start_fixed, true, b, t, slot.counter) else {
                        continue;
                    };
                    let Some(dropoff) = singles.leg(start_fixed, false, b, t, dropoff_counter) else {
                        continue;
                    };
                    let Some(times) = ScheduledTimes::compute(config, pickup, dropoff, ctx.promised)
                    else {
                        continue;
                    };
                    if !are_pickup_dropoff_compatible(events, p, d, &times, pickup, dropoff) {
                        continue;
                    }

                    let taxi_driving = pickup.taxi_driving + dropoff.taxi_driving + cumulated_driving;
                    let Some(taxi_waiting) =
                        pair_waiting_time(events, (p, d), pickup, dropoff, &times, taxi_driving, &around)
                    else {
                        continue;
                    };
                    if taxi_waiting > config.max_taxi_waiting() {
                        continue;
                    }
                    let passenger = weighted_passenger_duration(
                        ctx.required.passengers,
                        pickup,
                        dropoff,
                        &times,
                        &around,
                    );
                    let cost = Cost::new(config, passenger, taxi_driving, taxi_waiting);
                    trace!(
                        pickup = %pickup.case,
                        dropoff = %dropoff.case,
                        vehicle = %slot.vehicle.id,
                        p,
                        d,
                        cost = cost.total,
                        "pair insertion"
                    );
                    if best.get(b, t).is_some_and(|current| current.cost.total <= cost.total) {
                        continue;
                    }

                    best.offer(
                        b,
                        t,
                        Insertion {
                            company_idx: slot.company_idx,
                            company: slot.company.id,
                            vehicle: slot.vehicle.id,
                            vehicle_revision: slot.vehicle.revision,
                            tour: events.get(p).map(|e| e.tour),
                            pickup_case: pickup.case,
                            dropoff_case: dropoff.case,
                            pickup_idx: Some(p),
                            dropoff_idx: Some(d),
                            pickup_time: times.pickup.end(),
                            dropoff_time: times.dropoff.start(),
                            scheduled_pickup: times.pickup,
                            scheduled_dropoff: times.dropoff,
                            departure: pickup
                                .case
                                .comes_from_company()
                                .then(|| times.pickup.end() - pickup.approach),
                            arrival: dropoff
                                .case
                                .returns_to_company()
                                .then(|| times.dropoff.start() + dropoff.return_leg),
                            pickup_prev_leg: pickup.approach,
                            pickup_next_leg: pickup.return_leg,
                            dropoff_prev_leg: dropoff.approach,
                            dropoff_next_leg: dropoff.return_leg,
                            prev_pickup: pickup.prev,
                            next_pickup: pickup.next,
                            prev_dropoff: dropoff.prev,
                            next_dropoff: dropoff.next,
                            cost,
                        },
                    );
                }
            }
        }
    }
    best
}
