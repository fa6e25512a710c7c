//! One evaluation request and the pipeline that answers it.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{Capacities, Company, Coordinates, DomainError, Interval};
use crate::routing::RoutingProvider;

use super::DispatchError;
use super::case::InsertDirection;
use super::config::DispatchConfig;
use super::evaluate::{EvaluationContext, evaluate_new_tours, evaluate_single_insertions};
use super::matrix::{RoutingPlan, route};
use super::pair::evaluate_pair_insertions;
use super::select::{CandidateGrid, take_best};
use super::slots::InsertionRanges;

/// A boarding-point candidate with the times a passenger could use it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardingPoint {
    pub coordinates: Coordinates,
    pub times: Vec<DateTime<Utc>>,
}

/// Times confirmed to the passenger by an earlier offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromisedTimes {
    pub pickup: DateTime<Utc>,
    pub dropoff: DateTime<Utc>,
}

/// Where a passenger wants to go and which boarding points could serve
/// the other end of the trip.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub user_chosen: Coordinates,
    pub boarding_points: Vec<BoardingPoint>,
    pub required: Capacities,
    /// The boarding-point time is the departure time: the passenger rides
    /// from the boarding point to the user-chosen point.
    pub start_fixed: bool,
    pub promised: Option<PromisedTimes>,
}

impl DispatchRequest {
    pub fn validate(&self) -> Result<(), DispatchError> {
        self.required
            .validate_demand()
            .map_err(|e| DispatchError::invalid(format!("capacities.{}", e.field), e.reason))?;
        if let Some(i) = self.boarding_points.iter().position(|b| b.times.is_empty()) {
            return Err(DispatchError::invalid(
                format!("boardingPoints[{i}].times"),
                DomainError::NoCandidateTimes(i).to_string(),
            ));
        }
        if self.promised.is_some_and(|p| p.dropoff < p.pickup) {
            return Err(DispatchError::invalid(
                "promisedTimes",
                "dropoff is before pickup",
            ));
        }
        Ok(())
    }

    pub fn direction(&self) -> InsertDirection {
        InsertDirection::from_start_fixed(self.start_fixed)
    }

    /// The smallest interval containing every candidate time.
    pub fn search_interval(&self) -> Option<Interval> {
        let times = self.boarding_points.iter().flat_map(|b| b.times.iter().copied());
        let (min, max) = times.fold(None, |acc: Option<(DateTime<Utc>, DateTime<Utc>)>, t| {
            Some(acc.map_or((t, t), |(lo, hi)| (lo.min(t), hi.max(t))))
        })?;
        Some(Interval::new(min, max))
    }

    /// Time cells per boarding point.
    pub fn shape(&self) -> Vec<usize> {
        self.boarding_points.iter().map(|b| b.times.len()).collect()
    }

    /// The window around each candidate time in which the passenger is
    /// willing to be at the boarding point.
    pub fn bus_stop_windows(&self, config: &DispatchConfig) -> Vec<Vec<Interval>> {
        self.boarding_points
            .iter()
            .map(|b| {
                b.times
                    .iter()
                    .map(|&t| {
                        if self.start_fixed {
                            Interval::new(t, t + config.max_passenger_waiting_dropoff())
                        } else {
                            Interval::new(t - config.max_passenger_waiting_pickup(), t)
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// Find the best insertion per boarding point and time.
///
/// `companies` is the snapshot to plan against, `search` the interval new
/// stops may be placed in, `now` the current time.
pub async fn evaluate_request<R: RoutingProvider>(
    companies: &[Company],
    search: Interval,
    request: &DispatchRequest,
    router: &R,
    config: &DispatchConfig,
    now: DateTime<Utc>,
) -> Result<CandidateGrid, DispatchError> {
    let shape = request.shape();
    if companies.is_empty() {
        return Ok(CandidateGrid::new(&shape));
    }

    let ranges = InsertionRanges::compute(companies, &request.required);
    let plan = RoutingPlan::gather(companies, &ranges);
    debug!(
        companies = companies.len(),
        slots = ranges.slot_count(),
        "evaluating request"
    );

    let bus_stops: Vec<Coordinates> = request.boarding_points.iter().map(|b| b.coordinates).collect();
    let results = route(router, &plan, request.user_chosen, &bus_stops, request.start_fixed).await?;

    let bus_stop_windows = request.bus_stop_windows(config);
    let ctx = EvaluationContext {
        config,
        direction: request.direction(),
        search,
        prep: now + config.min_prep(),
        bus_stop_windows: &bus_stop_windows,
        results: &results,
        promised: request.promised,
        required: request.required,
    };

    let new_tours = evaluate_new_tours(&ctx, companies);
    let singles = evaluate_single_insertions(&ctx, companies, &ranges);
    let pairs = evaluate_pair_insertions(&ctx, companies, &ranges, &singles);
    debug!(
        new_tours = new_tours.filled(),
        both = singles.both.filled(),
        pairs = pairs.filled(),
        "evaluations kept"
    );

    Ok(take_best(take_best(singles.both, new_tours), pairs))
}

/// Widen `search` by the evaluation horizon.
pub fn evaluation_interval(search: Interval, config: &DispatchConfig) -> Interval {
    let horizon = config.tour_horizon();
    search.expand(horizon, horizon)
}

/// Shorthand used by callers that only know one candidate time.
pub fn single_time(coordinates: Coordinates, time: DateTime<Utc>) -> BoardingPoint {
    BoardingPoint {
        coordinates,
        times: vec![time],
    }
}
