//! Leg durations and time windows of a single insertion.
//!
//! Everything here is pure: routing answers come in through
//! [`RoutingResults`], the schedule through the neighbouring events.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Event, Interval, Vehicle};

use super::case::{InsertDirection, InsertHow, InsertWhat, InsertionCase};
use super::config::DispatchConfig;
use super::matrix::{RoutingResults, SlotRouting, Target};

/// Where the legs of one candidate are looked up.
#[derive(Debug, Clone, Copy)]
pub struct LegSource<'a> {
    pub results: &'a RoutingResults,
    pub company_idx: usize,
    /// `None` for new tours, which only use the depot.
    pub slot: Option<&'a SlotRouting>,
    /// The boarding point under evaluation, if any.
    pub bus_stop: Option<usize>,
}

fn target(bus_stop_side: bool, bus_stop: Option<usize>) -> Option<Target> {
    if bus_stop_side {
        bus_stop.map(Target::BusStop)
    } else {
        Some(Target::UserChosen)
    }
}

/// The point a case's approach leg arrives at.
fn approach_target(case: &InsertionCase, bus_stop: Option<usize>) -> Option<Target> {
    let bus_stop_side = match case.what() {
        InsertWhat::UserChosen => false,
        InsertWhat::BusStop => true,
        InsertWhat::Both => case.direction() == InsertDirection::FromBusStop,
    };
    target(bus_stop_side, bus_stop)
}

/// The point a case's return leg leaves from.
fn return_target(case: &InsertionCase, bus_stop: Option<usize>) -> Option<Target> {
    let bus_stop_side = match case.what() {
        InsertWhat::UserChosen => false,
        InsertWhat::BusStop => true,
        InsertWhat::Both => case.direction() == InsertDirection::ToBusStop,
    };
    target(bus_stop_side, bus_stop)
}

/// Driving time into the new stop, padded with the buffer.
///
/// From the depot if the case comes from the company, else from the
/// previous event. `None` if unknown or longer than the maximum travel time.
pub fn approach_duration(
    config: &DispatchConfig,
    case: &InsertionCase,
    source: &LegSource<'_>,
) -> Option<Duration> {
    let legs = source.results.legs(approach_target(case, source.bus_stop)?)?;
    let raw = if case.comes_from_company() {
        legs.from_company(source.company_idx)
    } else {
        legs.from_prev(source.slot?)
    }?;
    (raw <= config.max_travel()).then(|| config.pad_approach(raw))
}

/// Driving time out of the new stop, padded with buffer and passenger
/// change time.
pub fn return_duration(
    config: &DispatchConfig,
    case: &InsertionCase,
    source: &LegSource<'_>,
) -> Option<Duration> {
    let legs = source.results.legs(return_target(case, source.bus_stop)?)?;
    let raw = if case.returns_to_company() {
        legs.to_company(source.company_idx)
    } else {
        legs.to_next(source.slot?)
    }?;
    (raw <= config.max_travel()).then(|| config.pad_return(raw))
}

/// The windows in which the vehicle is free to serve a new stop.
///
/// Bounded by the neighbouring events (or `search`) and never earlier than
/// `prep`. Modes that touch a tour boundary are further limited to the
/// availability around that boundary; new tours use every gap between
/// existing tours.
pub fn allowed_operation_times(
    case: &InsertionCase,
    prev: Option<&Event>,
    next: Option<&Event>,
    search: Interval,
    prep: DateTime<Utc>,
    vehicle: &Vehicle,
) -> Vec<Interval> {
    let start = match prev {
        Some(prev) if case.comes_from_company() => prev.arrival,
        Some(prev) => prev.communicated,
        None => search.start(),
    };
    let end = match next {
        Some(next) if case.returns_to_company() => next.departure,
        Some(next) => next.communicated,
        None => search.end(),
    };
    let Ok(window) = Interval::try_new(start.max(prep), end) else {
        return Vec::new();
    };

    let relevant: Vec<Interval> = match case.how() {
        InsertHow::Insert => return vec![window],
        InsertHow::NewTour => {
            return Interval::subtract(&vehicle.availabilities, &vehicle.tour_intervals())
                .iter()
                .filter_map(|free| free.intersect(&window))
                .collect();
        }
        InsertHow::Append => covering(vehicle, |a| a.covers(window.start())),
        InsertHow::Prepend => covering(vehicle, |a| a.covers(window.end())),
        InsertHow::Connect => covering(vehicle, |a| a.contains(&window)),
    };
    debug_assert!(
        relevant.len() <= 1,
        "availabilities of vehicle {} overlap",
        vehicle.id
    );
    relevant
        .iter()
        .filter_map(|a| a.intersect(&window))
        .collect()
}

fn covering(vehicle: &Vehicle, pred: impl Fn(&Interval) -> bool) -> Vec<Interval> {
    vehicle
        .availabilities
        .iter()
        .copied()
        .filter(|a| pred(a))
        .collect()
}

/// Narrow the allowed windows to the times the new stop itself can happen.
///
/// Each window loses the approach leg at the front and the return leg at
/// the back. For a both-insertion `travel` (already padded) is also taken
/// off the side facing away from the boarding point, so the result is the
/// window of the boarding-point time. Of several survivors the one with
/// the latest end wins when leaving from the boarding point, the one with
/// the earliest start otherwise.
pub fn arrival_window(
    case: &InsertionCase,
    windows: &[Interval],
    travel: Duration,
    bus_stop_window: Option<Interval>,
    approach: Duration,
    return_leg: Duration,
) -> Option<Interval> {
    let (front, back) = match (case.what(), case.direction()) {
        (InsertWhat::Both, InsertDirection::ToBusStop) => (approach + travel, return_leg),
        (InsertWhat::Both, InsertDirection::FromBusStop) => (approach, return_leg + travel),
        _ => (approach, return_leg),
    };

    let candidates = windows
        .iter()
        .filter_map(|w| w.shrink(front, back))
        .filter_map(|w| match bus_stop_window {
            Some(bus_stop) => w.intersect(&bus_stop),
            None => Some(w),
        });

    match case.direction() {
        InsertDirection::FromBusStop => candidates.max_by_key(|w| w.end()),
        InsertDirection::ToBusStop => candidates.min_by_key(|w| w.start()),
    }
}

/// Driving time the insertion takes away from the schedule.
pub fn old_driving_time(case: &InsertionCase, prev: Option<&Event>, next: Option<&Event>) -> Option<Duration> {
    match case.how() {
        InsertHow::NewTour => Some(Duration::zero()),
        InsertHow::Connect => Some(next?.prev_leg + prev?.next_leg),
        InsertHow::Prepend => Some(next?.prev_leg),
        InsertHow::Append | InsertHow::Insert => Some(prev?.next_leg),
    }
}

/// Change in the vehicle's idle time inside tours.
///
/// `driving` is the total driving time of the new legs. `departure` and
/// `arrival` are the new tour boundaries when the case starts or ends a
/// tour. Returns `None` when a neighbour the case needs is missing.
pub fn taxi_waiting_delta(
    case: &InsertionCase,
    driving: Duration,
    departure: Option<DateTime<Utc>>,
    arrival: Option<DateTime<Utc>>,
    prev: Option<&Event>,
    next: Option<&Event>,
) -> Option<Duration> {
    if case.how() == InsertHow::NewTour {
        return Some(Duration::zero());
    }
    let old = match case.how() {
        InsertHow::Insert => {
            let (prev, next) = (prev?, next?);
            next.communicated - prev.communicated - prev.next_leg
        }
        _ => Duration::zero(),
    };
    let prev_task = match case.how() {
        InsertHow::Prepend => departure?,
        _ => prev?.communicated,
    };
    let next_task = match case.how() {
        InsertHow::Append => arrival?,
        _ => next?.communicated,
    };
    let new = next_task - prev_task - driving;
    debug_assert!(new >= Duration::zero(), "negative waiting time for {case}");
    Some(new - old)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::event::fixtures::at;
    use proptest::prelude::*;

    prop_compose! {
        fn windows()(spans in prop::collection::vec((0i64..600, 0i64..240), 1..5)) -> Vec<Interval> {
            let base = at(6, 0);
            spans
                .into_iter()
                .map(|(start, len)| {
                    let start = base + Duration::minutes(start);
                    Interval::new(start, start + Duration::minutes(len))
                })
                .collect()
        }
    }

    prop_compose! {
        fn legs()(approach in 0i64..120, ret in 0i64..120, travel in 0i64..90) -> (Duration, Duration, Duration) {
            (Duration::minutes(approach), Duration::minutes(ret), Duration::minutes(travel))
        }
    }

    proptest! {
        #[test]
        fn arrival_window_leaves_room_for_legs(
            windows in windows(),
            (approach, ret, travel) in legs(),
            from in any::<bool>(),
        ) {
            let case = InsertionCase::new_tour(InsertDirection::from_start_fixed(from));
            if let Some(w) = arrival_window(&case, &windows, travel, None, approach, ret) {
                prop_assert!(w.start() <= w.end());
                let needed = approach + ret + travel;
                let fits_in_outer = windows.iter().any(|outer| {
                    outer.contains(&w) && outer.duration() >= needed + w.duration()
                });
                prop_assert!(fits_in_outer);
            }
        }
    }
}
