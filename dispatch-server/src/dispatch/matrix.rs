//! Routing coordination.
//!
//! Routing happens in two phases. [`RoutingPlan::gather`] walks the slots
//! and collects every point a new stop could be driven from or to, without
//! any I/O. [`route`] then issues one batched one-to-many query per target
//! point and direction, and the answers are looked up per slot through the
//! indices the plan recorded.

use std::collections::HashMap;
use std::iter;

use chrono::Duration;
use futures::future::{join, join_all};
use tracing::debug;

use crate::domain::{Company, Coordinates};
use crate::routing::{Direction, RoutingError, RoutingProvider};

use super::slots::{InsertionRanges, iterate_slots};

/// Where the neighbours of one slot sit in the gathered lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotRouting {
    /// Index into [`RoutingPlan::backward`] of the previous event.
    pub prev: Option<usize>,
    /// Index into [`RoutingPlan::forward`] of the next event.
    pub next: Option<usize>,
}

/// The deduplicated coordinate lists of one evaluation.
///
/// Both lists start with every company depot, in company order, so the
/// depot of company `c` is entry `c` of either list.
#[derive(Debug, Clone, Default)]
pub struct RoutingPlan {
    /// Points a new stop may be approached from.
    pub backward: Vec<Coordinates>,
    /// Points a new stop may return to.
    pub forward: Vec<Coordinates>,
    /// Per slot, in walk order.
    pub slots: Vec<SlotRouting>,
}

#[derive(Default)]
struct Deduplicated {
    points: Vec<Coordinates>,
    index: HashMap<(u64, u64), usize>,
}

impl Deduplicated {
    fn push(&mut self, point: Coordinates) -> usize {
        if let Some(&idx) = self.index.get(&point.key()) {
            return idx;
        }
        self.points.push(point);
        let idx = self.points.len() - 1;
        self.index.insert(point.key(), idx);
        idx
    }
}

impl RoutingPlan {
    pub fn gather(companies: &[Company], ranges: &InsertionRanges) -> Self {
        let mut backward = Deduplicated::default();
        let mut forward = Deduplicated::default();
        for company in companies {
            // Depots are never deduplicated against each other.
            backward.points.push(company.coordinates);
            forward.points.push(company.coordinates);
        }
        for (idx, company) in companies.iter().enumerate() {
            backward.index.entry(company.coordinates.key()).or_insert(idx);
            forward.index.entry(company.coordinates.key()).or_insert(idx);
        }

        let slots = iterate_slots(companies, ranges)
            .map(|slot| SlotRouting {
                prev: slot.prev().map(|e| backward.push(e.coordinates)),
                next: slot.next().map(|e| forward.push(e.coordinates)),
            })
            .collect();

        Self {
            backward: backward.points,
            forward: forward.points,
            slots,
        }
    }
}

/// Driving times between one target point and the gathered lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegDurations {
    /// From each entry of [`RoutingPlan::backward`] to the target.
    pub from: Vec<Option<Duration>>,
    /// From the target to each entry of [`RoutingPlan::forward`].
    pub to: Vec<Option<Duration>>,
}

impl LegDurations {
    pub fn from_company(&self, company_idx: usize) -> Option<Duration> {
        self.from.get(company_idx).copied().flatten()
    }

    pub fn to_company(&self, company_idx: usize) -> Option<Duration> {
        self.to.get(company_idx).copied().flatten()
    }

    pub fn from_prev(&self, slot: &SlotRouting) -> Option<Duration> {
        slot.prev.and_then(|i| self.from.get(i).copied().flatten())
    }

    pub fn to_next(&self, slot: &SlotRouting) -> Option<Duration> {
        slot.next.and_then(|i| self.to.get(i).copied().flatten())
    }
}

/// The point a leg is routed to or from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    UserChosen,
    BusStop(usize),
}

/// Everything routing contributes to one evaluation.
#[derive(Debug, Clone, Default)]
pub struct RoutingResults {
    pub user_chosen: LegDurations,
    /// One entry per boarding-point candidate.
    pub bus_stops: Vec<LegDurations>,
    /// Between the user-chosen point and each boarding point, in travel
    /// direction.
    pub travel: Vec<Option<Duration>>,
    pub slots: Vec<SlotRouting>,
}

impl RoutingResults {
    pub fn legs(&self, target: Target) -> Option<&LegDurations> {
        match target {
            Target::UserChosen => Some(&self.user_chosen),
            Target::BusStop(b) => self.bus_stops.get(b),
        }
    }

    pub fn slot(&self, counter: usize) -> Option<&SlotRouting> {
        self.slots.get(counter)
    }

    pub fn travel(&self, bus_stop: usize) -> Option<Duration> {
        self.travel.get(bus_stop).copied().flatten()
    }
}

/// Replace the answer for every destination at the origin's position by
/// zero, and check the provider answered for every destination.
fn mark_same_place(
    origin: Coordinates,
    destinations: &[Coordinates],
    durations: Vec<Option<Duration>>,
) -> Result<Vec<Option<Duration>>, RoutingError> {
    if durations.len() != destinations.len() {
        return Err(RoutingError::LengthMismatch {
            expected: destinations.len(),
            got: durations.len(),
        });
    }
    Ok(destinations
        .iter()
        .zip(durations)
        .map(|(d, duration)| {
            if origin.same_place(d) {
                Some(Duration::zero())
            } else {
                duration
            }
        })
        .collect())
}

/// Query every target point against the plan's lists in both directions.
///
/// `start_fixed` decides the travel direction between the user-chosen
/// point and the boarding points: from the boarding point if set.
pub async fn route<R: RoutingProvider>(
    router: &R,
    plan: &RoutingPlan,
    user_chosen: Coordinates,
    bus_stops: &[Coordinates],
    start_fixed: bool,
) -> Result<RoutingResults, RoutingError> {
    let targets: Vec<Coordinates> = iter::once(user_chosen).chain(bus_stops.iter().copied()).collect();
    debug!(
        targets = targets.len(),
        backward = plan.backward.len(),
        forward = plan.forward.len(),
        "routing"
    );

    let queries = targets.iter().map(|&target| async move {
        let (from, to) = join(
            router.one_to_many(target, &plan.backward, Direction::Backward),
            router.one_to_many(target, &plan.forward, Direction::Forward),
        )
        .await;
        Ok::<_, RoutingError>(LegDurations {
            from: mark_same_place(target, &plan.backward, from?)?,
            to: mark_same_place(target, &plan.forward, to?)?,
        })
    });
    let travel_direction = if start_fixed {
        Direction::Backward
    } else {
        Direction::Forward
    };
    let (legs, travel) = join(
        join_all(queries),
        router.one_to_many(user_chosen, bus_stops, travel_direction),
    )
    .await;

    let mut legs = legs.into_iter().collect::<Result<Vec<_>, _>>()?.into_iter();
    let travel = mark_same_place(user_chosen, bus_stops, travel?)?;

    Ok(RoutingResults {
        user_chosen: legs.next().unwrap_or_default(),
        bus_stops: legs.collect(),
        travel,
        slots: plan.slots.clone(),
    })
}
