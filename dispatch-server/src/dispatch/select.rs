//! Insertion records, their cost, and best-per-cell selection.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{CompanyId, EventId, Interval, TourId, VehicleId};

use super::case::InsertionCase;
use super::config::DispatchConfig;

/// Weighted sum of the three cost components, in seconds.
///
/// ```
/// use chrono::Duration;
/// use dispatch_server::dispatch::{DispatchConfig, compute_cost};
///
/// let config = DispatchConfig::default();
/// let cost = compute_cost(&config, Duration::minutes(10), Duration::minutes(5), Duration::minutes(20));
/// assert_eq!(cost, 600.0 + 300.0 + 0.2 * 1200.0);
/// ```
pub fn compute_cost(
    config: &DispatchConfig,
    passenger: Duration,
    taxi_driving: Duration,
    taxi_waiting: Duration,
) -> f64 {
    config.passenger_time_cost_factor * passenger.num_seconds() as f64
        + config.taxi_driving_cost_factor * taxi_driving.num_seconds() as f64
        + config.taxi_waiting_cost_factor * taxi_waiting.num_seconds() as f64
}

/// Cost breakdown of one insertion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    /// Extra driving the vehicle does.
    pub taxi_driving: Duration,
    /// Extra idle time inside tours.
    pub taxi_waiting: Duration,
    /// Passenger ride time, weighted by head count, including shifts
    /// forced on other passengers.
    pub passenger: Duration,
    pub total: f64,
}

impl Cost {
    pub fn new(
        config: &DispatchConfig,
        passenger: Duration,
        taxi_driving: Duration,
        taxi_waiting: Duration,
    ) -> Self {
        Self {
            taxi_driving,
            taxi_waiting,
            passenger,
            total: compute_cost(config, passenger, taxi_driving, taxi_waiting),
        }
    }
}

/// A complete candidate: where both legs go and what it costs.
///
/// Carries everything the booking plan needs, so the chosen insertion can
/// be committed without re-reading the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    /// Position of the company in the evaluated snapshot.
    pub company_idx: usize,
    pub company: CompanyId,
    pub vehicle: VehicleId,
    /// Revision of the vehicle the insertion was computed against.
    pub vehicle_revision: u64,
    /// The tour the legs join; `None` opens a new tour.
    pub tour: Option<TourId>,
    pub pickup_case: InsertionCase,
    pub dropoff_case: InsertionCase,
    /// Slots in the vehicle's event list; `None` for a new tour.
    pub pickup_idx: Option<usize>,
    pub dropoff_idx: Option<usize>,
    pub pickup_time: DateTime<Utc>,
    pub dropoff_time: DateTime<Utc>,
    pub scheduled_pickup: Interval,
    pub scheduled_dropoff: Interval,
    /// New tour start, when the pickup leaves from the depot.
    pub departure: Option<DateTime<Utc>>,
    /// New tour end, when the dropoff returns to the depot.
    pub arrival: Option<DateTime<Utc>>,
    pub pickup_prev_leg: Duration,
    pub pickup_next_leg: Duration,
    pub dropoff_prev_leg: Duration,
    pub dropoff_next_leg: Duration,
    pub prev_pickup: Option<EventId>,
    pub next_pickup: Option<EventId>,
    pub prev_dropoff: Option<EventId>,
    pub next_dropoff: Option<EventId>,
    pub cost: Cost,
}

impl Insertion {
    /// Whether pickup and dropoff share one slot.
    pub fn is_both(&self) -> bool {
        self.pickup_idx == self.dropoff_idx
    }
}

/// Best insertion per boarding point and candidate time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateGrid {
    cells: Vec<Vec<Option<Insertion>>>,
}

impl CandidateGrid {
    /// An empty grid with `times[b]` cells for boarding point `b`.
    pub fn new(times: &[usize]) -> Self {
        Self {
            cells: times.iter().map(|&n| vec![None; n]).collect(),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        self.cells.iter().map(Vec::len).collect()
    }

    pub fn get(&self, bus_stop: usize, time: usize) -> Option<&Insertion> {
        self.cells.get(bus_stop)?.get(time)?.as_ref()
    }

    /// Keep `candidate` if its cell is empty or it is strictly cheaper.
    /// Returns whether it was kept.
    pub fn offer(&mut self, bus_stop: usize, time: usize, candidate: Insertion) -> bool {
        let Some(cell) = self.cells.get_mut(bus_stop).and_then(|row| row.get_mut(time)) else {
            return false;
        };
        match cell {
            Some(best) if best.cost.total <= candidate.cost.total => false,
            _ => {
                *cell = Some(candidate);
                true
            }
        }
    }

    /// Number of filled cells.
    pub fn filled(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    pub fn into_cells(self) -> Vec<Vec<Option<Insertion>>> {
        self.cells
    }
}

/// Cell-wise minimum of two grids of the same shape. Ties keep `a`.
pub fn take_best(a: CandidateGrid, b: CandidateGrid) -> CandidateGrid {
    debug_assert_eq!(a.shape(), b.shape(), "grids of different shape");
    let mut best = a;
    for (bus_stop, row) in b.cells.into_iter().enumerate() {
        for (time, cell) in row.into_iter().enumerate() {
            if let Some(candidate) = cell {
                best.offer(bus_stop, time, candidate);
            }
        }
    }
    best
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::dispatch::case::{InsertDirection, InsertionCase};
    use crate::domain::event::fixtures::at;

    /// A new-tour insertion with the given total cost.
    pub fn insertion(total: f64) -> Insertion {
        let case = InsertionCase::new_tour(InsertDirection::ToBusStop);
        Insertion {
            company_idx: 0,
            company: CompanyId(1),
            vehicle: VehicleId(1),
            vehicle_revision: 0,
            tour: None,
            pickup_case: case,
            dropoff_case: case,
            pickup_idx: None,
            dropoff_idx: None,
            pickup_time: at(9, 0),
            dropoff_time: at(9, 30),
            scheduled_pickup: Interval::point(at(9, 0)),
            scheduled_dropoff: Interval::point(at(9, 30)),
            departure: Some(at(8, 45)),
            arrival: Some(at(9, 45)),
            pickup_prev_leg: Duration::minutes(15),
            pickup_next_leg: Duration::minutes(30),
            dropoff_prev_leg: Duration::minutes(30),
            dropoff_next_leg: Duration::minutes(15),
            prev_pickup: None,
            next_pickup: None,
            prev_dropoff: None,
            next_dropoff: None,
            cost: Cost {
                taxi_driving: Duration::zero(),
                taxi_waiting: Duration::zero(),
                passenger: Duration::zero(),
                total,
            },
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::fixtures::insertion;
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn grid(rows: usize, cols: usize)
            (costs in prop::collection::vec(prop::option::of(0.0f64..1e6), rows * cols))
            -> CandidateGrid
        {
            let mut grid = CandidateGrid::new(&vec![cols; rows]);
            for (i, cost) in costs.into_iter().enumerate() {
                if let Some(cost) = cost {
                    grid.offer(i / cols, i % cols, insertion(cost));
                }
            }
            grid
        }
    }

    proptest! {
        #[test]
        fn cost_is_non_negative(
            passenger in 0i64..100_000,
            driving in 0i64..100_000,
            waiting in 0i64..100_000,
        ) {
            let config = DispatchConfig::default();
            let cost = compute_cost(
                &config,
                Duration::seconds(passenger),
                Duration::seconds(driving),
                Duration::seconds(waiting),
            );
            prop_assert!(cost >= 0.0);
        }

        #[test]
        fn take_best_never_worse(a in grid(3, 2), b in grid(3, 2)) {
            let best = take_best(a.clone(), b.clone());
            for bus_stop in 0..3 {
                for time in 0..2 {
                    let costs = [a.get(bus_stop, time), b.get(bus_stop, time)]
                        .into_iter()
                        .flatten()
                        .map(|i| i.cost.total);
                    let min = costs.fold(None, |m: Option<f64>, c| Some(m.map_or(c, |m| m.min(c))));
                    prop_assert_eq!(best.get(bus_stop, time).map(|i| i.cost.total), min);
                }
            }
        }
    }
}
