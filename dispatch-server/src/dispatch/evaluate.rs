//! Single-leg, both-leg and new-tour evaluation.
//!
//! A single evaluation places one stop (the user-chosen point or a
//! boarding point) into one slot. A both evaluation places pickup and
//! dropoff back to back into the same slot and is a complete candidate on
//! its own; single evaluations are only halves that
//! [`evaluate_pair_insertions`](super::evaluate_pair_insertions) combines.

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::domain::{Capacities, Company, Event, EventId, Interval, Vehicle};

use super::capacity::is_valid;
use super::case::{InsertDirection, InsertHow, InsertWhat, InsertWhere, InsertionCase};
use super::config::DispatchConfig;
use super::durations::{
    LegSource, allowed_operation_times, approach_duration, arrival_window, old_driving_time,
    return_duration, taxi_waiting_delta,
};
use super::matrix::{RoutingResults, SlotRouting};
use super::request::PromisedTimes;
use super::select::{CandidateGrid, Cost, Insertion, compute_cost};
use super::slots::{InsertionRanges, InsertionSlot, iterate_slots};

/// Everything that stays fixed while one request is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub config: &'a DispatchConfig,
    pub direction: InsertDirection,
    /// New stops must lie within this interval.
    pub search: Interval,
    /// Nothing may be planned before this.
    pub prep: DateTime<Utc>,
    /// Per boarding point, per candidate time.
    pub bus_stop_windows: &'a [Vec<Interval>],
    pub results: &'a RoutingResults,
    pub promised: Option<PromisedTimes>,
    pub required: Capacities,
}

impl EvaluationContext<'_> {
    pub fn shape(&self) -> Vec<usize> {
        self.bus_stop_windows.iter().map(Vec::len).collect()
    }

    /// Every (boarding point, time, window) cell `company` serves.
    fn cells<'c>(&'c self, company: &'c Company) -> impl Iterator<Item = (usize, usize, Interval)> + 'c {
        self.bus_stop_windows
            .iter()
            .enumerate()
            .filter(|(b, _)| company.serves(*b))
            .flat_map(|(b, times)| times.iter().enumerate().map(move |(t, w)| (b, t, *w)))
    }
}

/// Where a candidate goes: a vehicle, and for existing slots the slot and
/// its neighbours.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub company_idx: usize,
    pub company: &'a Company,
    pub vehicle: &'a Vehicle,
    /// `None` for a new tour.
    pub idx: Option<usize>,
    pub routing: Option<&'a SlotRouting>,
    pub prev: Option<&'a Event>,
    pub next: Option<&'a Event>,
}

impl<'a> Placement<'a> {
    pub fn new_tour(company_idx: usize, company: &'a Company, vehicle: &'a Vehicle) -> Self {
        Self {
            company_idx,
            company,
            vehicle,
            idx: None,
            routing: None,
            prev: None,
            next: None,
        }
    }

    pub fn at_slot(slot: &InsertionSlot<'a>, results: &'a RoutingResults) -> Self {
        Self {
            company_idx: slot.company_idx,
            company: slot.company,
            vehicle: slot.vehicle,
            idx: Some(slot.idx),
            routing: results.slot(slot.counter),
            prev: slot.prev(),
            next: slot.next(),
        }
    }

    fn legs(&self, results: &'a RoutingResults, bus_stop: Option<usize>) -> LegSource<'a> {
        LegSource {
            results,
            company_idx: self.company_idx,
            slot: self.routing,
            bus_stop,
        }
    }
}

/// One stop placed into one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleEvaluation {
    /// Preferred time within `window`.
    pub time: DateTime<Utc>,
    /// Every time the stop could happen.
    pub window: Interval,
    pub approach: Duration,
    pub return_leg: Duration,
    pub case: InsertionCase,
    pub passenger: Duration,
    pub taxi_driving: Duration,
    pub taxi_waiting: Duration,
    pub cost: f64,
    pub prev: Option<EventId>,
    pub next: Option<EventId>,
    pub idx: usize,
}

/// Whether a single case inserts the pickup: the boarding point when the
/// trip starts there, the user-chosen point otherwise.
fn is_pickup(case: &InsertionCase) -> bool {
    (case.what() == InsertWhat::BusStop) == (case.direction() == InsertDirection::FromBusStop)
}

/// Evaluate one stop at one slot. `bus_stop` is the boarding point and its
/// time window when the stop is a boarding point.
pub fn evaluate_single(
    ctx: &EvaluationContext<'_>,
    case: InsertionCase,
    windows: &[Interval],
    placement: &Placement<'_>,
    bus_stop: Option<(usize, Interval)>,
) -> Option<SingleEvaluation> {
    debug_assert_ne!(case.what(), InsertWhat::Both);
    let config = ctx.config;
    let source = placement.legs(ctx.results, bus_stop.map(|(b, _)| b));
    let approach = approach_duration(config, &case, &source)?;
    let return_leg = return_duration(config, &case, &source)?;
    let window = arrival_window(
        &case,
        windows,
        Duration::zero(),
        bus_stop.map(|(_, w)| w),
        approach,
        return_leg,
    )?;

    let promised = ctx
        .promised
        .map(|p| if is_pickup(&case) { p.pickup } else { p.dropoff });
    if promised.is_some_and(|t| !window.covers(t)) {
        return None;
    }

    let passenger = if is_pickup(&case) {
        return_leg - config.passenger_change()
    } else {
        approach
    };
    let taxi_driving = approach + return_leg - old_driving_time(&case, placement.prev, placement.next)?;
    let time = if case.is_earlier_better() {
        window.start()
    } else {
        window.end()
    };
    let taxi_waiting = taxi_waiting_delta(
        &case,
        approach + return_leg,
        Some(time - approach),
        Some(time + return_leg),
        placement.prev,
        placement.next,
    )?;

    Some(SingleEvaluation {
        time,
        window,
        approach,
        return_leg,
        case,
        passenger,
        taxi_driving,
        taxi_waiting,
        cost: compute_cost(config, passenger, taxi_driving, taxi_waiting),
        prev: placement.prev.map(|e| e.id),
        next: placement.next.map(|e| e.id),
        idx: placement.idx?,
    })
}

/// Pickup and dropoff windows of a both-insertion whose boarding-point
/// window is `window`.
fn both_windows(direction: InsertDirection, window: Interval, travel: Duration) -> (Interval, Interval) {
    match direction {
        InsertDirection::FromBusStop => (window, window.shift(travel)),
        InsertDirection::ToBusStop => (window.shift(-travel), window),
    }
}

/// Evaluate pickup and dropoff back to back at one slot (or in a new tour),
/// with boarding point `bus_stop` and its window for one candidate time.
pub fn evaluate_both(
    ctx: &EvaluationContext<'_>,
    case: InsertionCase,
    windows: &[Interval],
    placement: &Placement<'_>,
    bus_stop: usize,
    bus_stop_window: Interval,
) -> Option<Insertion> {
    debug_assert_eq!(case.what(), InsertWhat::Both);
    let config = ctx.config;
    let source = placement.legs(ctx.results, Some(bus_stop));
    let approach = approach_duration(config, &case, &source)?;
    let return_leg = return_duration(config, &case, &source)?;
    let raw_travel = ctx.results.travel(bus_stop)?;
    if raw_travel > config.max_travel() {
        return None;
    }
    let travel = raw_travel + config.buffer() + config.passenger_change();

    let window = arrival_window(&case, windows, travel, Some(bus_stop_window), approach, return_leg)?;
    let (pickup_window, dropoff_window) = both_windows(case.direction(), window, travel);
    let keeps_promises = |p: PromisedTimes| {
        pickup_window.covers(p.pickup) && dropoff_window.covers(p.dropoff)
    };
    if ctx.promised.is_some_and(|p| !keeps_promises(p)) {
        return None;
    }

    let taxi_driving =
        approach + return_leg + travel - old_driving_time(&case, placement.prev, placement.next)?;
    let (pickup_time, dropoff_time) = match case.direction() {
        InsertDirection::FromBusStop => (window.start(), window.start() + travel),
        InsertDirection::ToBusStop => (window.end() - travel, window.end()),
    };
    let departure = case.comes_from_company().then(|| pickup_time - approach);
    let arrival = case.returns_to_company().then(|| dropoff_time + return_leg);
    let taxi_waiting = taxi_waiting_delta(
        &case,
        approach + return_leg + travel,
        departure,
        arrival,
        placement.prev,
        placement.next,
    )?;
    if taxi_waiting > config.max_taxi_waiting() {
        return None;
    }

    let scheduled_pickup = Interval::try_new(
        pickup_window
            .start()
            .max(pickup_time - config.scheduled_buffer_pickup()),
        pickup_time,
    )
    .ok()?;
    let dropoff_buffer = config.scheduled_buffer_dropoff(dropoff_window.start() - pickup_window.end());
    let scheduled_dropoff =
        Interval::try_new(dropoff_time, dropoff_window.end().min(dropoff_time + dropoff_buffer)).ok()?;

    let passenger = travel * ctx.required.passengers;
    let tour = match case.how() {
        InsertHow::NewTour => None,
        InsertHow::Append => placement.prev.map(|e| e.tour),
        _ => placement.next.map(|e| e.tour),
    };
    let prev = placement.prev.map(|e| e.id);
    let next = placement.next.map(|e| e.id);

    Some(Insertion {
        company_idx: placement.company_idx,
        company: placement.company.id,
        vehicle: placement.vehicle.id,
        vehicle_revision: placement.vehicle.revision,
        tour,
        pickup_case: case,
        dropoff_case: case,
        pickup_idx: placement.idx,
        dropoff_idx: placement.idx,
        pickup_time,
        dropoff_time,
        scheduled_pickup,
        scheduled_dropoff,
        departure,
        arrival,
        pickup_prev_leg: approach,
        pickup_next_leg: travel,
        dropoff_prev_leg: travel,
        dropoff_next_leg: return_leg,
        prev_pickup: prev,
        next_pickup: next,
        prev_dropoff: prev,
        next_dropoff: next,
        cost: Cost::new(config, passenger, taxi_driving, taxi_waiting),
    })
}

/// Output of [`evaluate_single_insertions`].
#[derive(Debug, Clone, Default)]
pub struct SingleInsertions {
    /// Best boarding-point evaluation per boarding point, time and slot.
    pub bus_stops: Vec<Vec<Vec<Option<SingleEvaluation>>>>,
    /// Best user-chosen evaluation per slot.
    pub user_chosen: Vec<Option<SingleEvaluation>>,
    /// Best both-insertion per boarding point and time.
    pub both: CandidateGrid,
}

impl SingleInsertions {
    /// The single evaluation that could serve the pickup (`pickup`) or the
    /// dropoff of cell `(bus_stop, time)` at slot `counter`.
    pub fn leg(
        &self,
        start_fixed: bool,
        pickup: bool,
        bus_stop: usize,
        time: usize,
        counter: usize,
    ) -> Option<&SingleEvaluation> {
        let at_bus_stop = start_fixed == pickup;
        if at_bus_stop {
            self.bus_stops.get(bus_stop)?.get(time)?.get(counter)?.as_ref()
        } else {
            self.user_chosen.get(counter)?.as_ref()
        }
    }
}

fn keep_cheaper(cell: &mut Option<SingleEvaluation>, candidate: SingleEvaluation) {
    if cell.as_ref().is_none_or(|best| candidate.cost < best.cost) {
        *cell = Some(candidate);
    }
}

/// Evaluate every slot of every feasible range with every slot mode.
pub fn evaluate_single_insertions(
    ctx: &EvaluationContext<'_>,
    companies: &[Company],
    ranges: &InsertionRanges,
) -> SingleInsertions {
    let slot_count = ranges.slot_count();
    let mut out = SingleInsertions {
        bus_stops: ctx
            .bus_stop_windows
            .iter()
            .map(|times| vec![vec![None; slot_count]; times.len()])
            .collect(),
        user_chosen: vec![None; slot_count],
        both: CandidateGrid::new(&ctx.shape()),
    };

    for slot in iterate_slots(companies, ranges) {
        let placement = Placement::at_slot(&slot, ctx.results);
        let position = InsertWhere::of_slot(slot.vehicle, slot.idx);
        for how in InsertHow::SLOT_OPTIONS {
            let Some(case) = InsertionCase::new(how, InsertWhat::Both, position, ctx.direction) else {
                continue;
            };
            let windows = allowed_operation_times(
                &case,
                placement.prev,
                placement.next,
                ctx.search,
                ctx.prep,
                slot.vehicle,
            );
            if windows.is_empty() {
                continue;
            }

            let bus_case = case.with_what(InsertWhat::BusStop);
            for (b, t, bus_window) in ctx.cells(slot.company) {
                if let Some(both) = evaluate_both(ctx, case, &windows, &placement, b, bus_window) {
                    trace!(%case, vehicle = %slot.vehicle.id, slot = slot.idx, cost = both.cost.total, "both insertion");
                    out.both.offer(b, t, both);
                }
                let Some(bus_case) = bus_case else {
                    continue;
                };
                if let Some(single) =
                    evaluate_single(ctx, bus_case, &windows, &placement, Some((b, bus_window)))
                {
                    keep_cheaper(&mut out.bus_stops[b][t][slot.counter], single);
                }
            }

            let user = case
                .with_what(InsertWhat::UserChosen)
                .and_then(|user_case| evaluate_single(ctx, user_case, &windows, &placement, None));
            if let Some(single) = user {
                keep_cheaper(&mut out.user_chosen[slot.counter], single);
            }
        }
    }
    out
}

/// Evaluate a fresh tour on every vehicle that can carry the request.
pub fn evaluate_new_tours(ctx: &EvaluationContext<'_>, companies: &[Company]) -> CandidateGrid {
    let mut best = CandidateGrid::new(&ctx.shape());
    let case = InsertionCase::new_tour(ctx.direction);
    for (company_idx, company) in companies.iter().enumerate() {
        for vehicle in &company.vehicles {
            if !is_valid(&vehicle.capacities, &ctx.required) {
                continue;
            }
            let windows = allowed_operation_times(&case, None, None, ctx.search, ctx.prep, vehicle);
            if windows.is_empty() {
                continue;
            }
            let placement = Placement::new_tour(company_idx, company, vehicle);
            for (b, t, bus_window) in ctx.cells(company) {
                if let Some(insertion) = evaluate_both(ctx, case, &windows, &placement, b, bus_window) {
                    trace!(vehicle = %vehicle.id, cost = insertion.cost.total, "new tour");
                    best.offer(b, t, insertion);
                }
            }
        }
    }
    best
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::event::fixtures::*;

    fn m(n: i64) -> Duration {
        Duration::minutes(n)
    }

    fn context<'a>(
        config: &'a DispatchConfig,
        windows: &'a [Vec<Interval>],
        results: &'a RoutingResults,
        start_fixed: bool,
    ) -> EvaluationContext<'a> {
        EvaluationContext {
            config,
            direction: InsertDirection::from_start_fixed(start_fixed),
            search: Interval::new(at(4, 30), at(16, 30)),
            prep: at(6, 30),
            bus_stop_windows: windows,
            results,
            promised: None,
            required: Capacities::new(1, 0, 0, 0),
        }
    }

    #[test]
    fn new_tour_towards_boarding_point() {
        let config = DispatchConfig::default();
        let companies = busy_fleet();
        let (_, results) = ten_minutes(&companies, &Capacities::new(1, 0, 0, 0));
        let windows = windows_at(at(12, 0), false);
        let ctx = context(&config, &windows, &results, false);

        let grid = evaluate_new_tours(&ctx, &companies);
        let best = grid.get(0, 0).unwrap();
        // approach 10+4, travel 10+4+2, return 10+4+2
        assert_eq!(best.dropoff_time, at(12, 0));
        assert_eq!(best.pickup_time, at(11, 44));
        assert_eq!(best.departure, Some(at(11, 30)));
        assert_eq!(best.arrival, Some(at(12, 16)));
        assert_eq!(best.tour, None);
        assert_eq!(best.cost.taxi_driving, m(46));
        assert_eq!(best.cost.taxi_waiting, Duration::zero());
        assert_eq!(best.cost.passenger, m(16));
        assert_eq!(best.cost.total, (16 + 46) as f64 * 60.0);
        assert_eq!(best.scheduled_pickup, Interval::new(at(11, 34), at(11, 44)));
        assert_eq!(best.scheduled_dropoff, Interval::point(at(12, 0)));
    }

    #[test]
    fn ride_time_counts_every_passenger() {
        let config = DispatchConfig::default();
        let companies = busy_fleet();
        let required = Capacities::new(2, 0, 0, 0);
        let (_, results) = ten_minutes(&companies, &required);
        let windows = windows_at(at(12, 0), false);
        let ctx = EvaluationContext {
            required,
            ..context(&config, &windows, &results, false)
        };

        let best = evaluate_new_tours(&ctx, &companies).get(0, 0).cloned().unwrap();
        assert_eq!(best.cost.passenger, m(32));
        assert_eq!(best.cost.taxi_driving, m(46));
        assert_eq!(best.cost.total, (32 + 46) as f64 * 60.0);
    }

    #[test]
    fn new_tour_from_boarding_point() {
        let config = DispatchConfig::default();
        let companies = busy_fleet();
        let (_, results) = ten_minutes(&companies, &Capacities::new(1, 0, 0, 0));
        let windows = windows_at(at(12, 0), true);
        let ctx = context(&config, &windows, &results, true);

        let best = evaluate_new_tours(&ctx, &companies).get(0, 0).cloned().unwrap();
        assert_eq!(best.pickup_time, at(12, 0));
        assert_eq!(best.dropoff_time, at(12, 16));
        assert_eq!(best.scheduled_pickup, Interval::point(at(12, 0)));
        assert_eq!(best.scheduled_dropoff.start(), at(12, 16));
    }

    #[test]
    fn new_tour_skips_unserved_and_too_small() {
        let config = DispatchConfig::default();
        let mut companies = busy_fleet();
        let (_, results) = ten_minutes(&companies, &Capacities::new(1, 0, 0, 0));
        let windows = windows_at(at(12, 0), false);

        companies[0].serves_boarding_points = vec![false];
        let ctx = context(&config, &windows, &results, false);
        assert_eq!(evaluate_new_tours(&ctx, &companies).filled(), 0);

        companies[0].serves_boarding_points = vec![];
        let ctx = EvaluationContext {
            required: Capacities::new(4, 0, 0, 0),
            ..ctx
        };
        assert_eq!(evaluate_new_tours(&ctx, &companies).filled(), 0);
    }

    #[test]
    fn new_tour_respects_preparation_time() {
        let config = DispatchConfig::default();
        let companies = busy_fleet();
        let (_, results) = ten_minutes(&companies, &Capacities::new(1, 0, 0, 0));
        let windows = windows_at(at(12, 0), false);
        let ctx = EvaluationContext {
            prep: at(11, 45),
            ..context(&config, &windows, &results, false)
        };
        assert!(evaluate_new_tours(&ctx, &companies).get(0, 0).is_none());
    }

    #[test]
    fn append_beats_new_tour_when_close() {
        let config = DispatchConfig::default();
        let companies = busy_fleet();
        let (ranges, results) = ten_minutes(&companies, &Capacities::new(1, 0, 0, 0));
        let windows = windows_at(at(10, 30), false);
        let ctx = context(&config, &windows, &results, false);

        let singles = evaluate_single_insertions(&ctx, &companies, &ranges);
        let both = singles.both.get(0, 0).unwrap();
        assert_eq!(both.pickup_case.how(), InsertHow::Append);
        assert_eq!(both.tour, Some(crate::domain::TourId(1)));
        assert_eq!(both.pickup_idx, Some(2));
        assert_eq!(both.dropoff_time, at(10, 30));
        assert_eq!(both.arrival, Some(at(10, 46)));
        assert_eq!(both.departure, None);
        // 14 + 16 + 16 minus the old return leg
        assert_eq!(both.cost.taxi_driving, m(36));
        // 09:30 to 10:46 minus 46 minutes of driving
        assert_eq!(both.cost.taxi_waiting, m(30));
        assert_eq!(both.cost.total, 960.0 + 2160.0 + 360.0);

        let new_tour = evaluate_new_tours(&ctx, &companies);
        assert!(new_tour.get(0, 0).unwrap().cost.total > both.cost.total);
    }

    #[test]
    fn single_evaluations_land_in_their_slots() {
        let config = DispatchConfig::default();
        let companies = busy_fleet();
        let (ranges, results) = ten_minutes(&companies, &Capacities::new(1, 0, 0, 0));
        let windows = windows_at(at(10, 30), false);
        let ctx = context(&config, &windows, &results, false);
        let singles = evaluate_single_insertions(&ctx, &companies, &ranges);

        // the boarding point is the dropoff: appended after the tour
        let bus = singles.bus_stops[0][0][2].as_ref().unwrap();
        assert_eq!(bus.case.how(), InsertHow::Append);
        assert_eq!(bus.time, at(10, 30));
        assert_eq!(bus.window, Interval::new(at(10, 20), at(10, 30)));
        assert_eq!(bus.passenger, m(14));
        assert_eq!(bus.taxi_driving, m(20));
        assert_eq!(bus.taxi_waiting, m(46));
        assert_eq!(bus.prev, Some(crate::domain::EventId(2)));
        assert!(singles.bus_stops[0][0][0].is_none());

        // the user-chosen pickup fits exactly between the two events
        let user = singles.user_chosen[1].as_ref().unwrap();
        assert_eq!(user.case.how(), InsertHow::Insert);
        assert_eq!(user.window, Interval::point(at(9, 14)));
        // a pickup may not end a tour
        assert!(singles.user_chosen[2].is_none());
    }

    #[test]
    fn promised_times_must_be_kept() {
        let config = DispatchConfig::default();
        let companies = busy_fleet();
        let (_, results) = ten_minutes(&companies, &Capacities::new(1, 0, 0, 0));
        let windows = windows_at(at(12, 0), false);
        let ctx = EvaluationContext {
            promised: Some(PromisedTimes {
                pickup: at(11, 40),
                dropoff: at(11, 56),
            }),
            ..context(&config, &windows, &results, false)
        };
        assert!(evaluate_new_tours(&ctx, &companies).get(0, 0).is_some());

        let ctx = EvaluationContext {
            promised: Some(PromisedTimes {
                pickup: at(11, 0),
                dropoff: at(11, 16),
            }),
            ..ctx
        };
        assert!(evaluate_new_tours(&ctx, &companies).get(0, 0).is_none());
    }
}
