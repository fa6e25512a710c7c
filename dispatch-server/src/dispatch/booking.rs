//! Turning a chosen insertion into the writes that commit it.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Capacities, CompanyId, Coordinates, Event, EventId, Interval, TourId, Vehicle, VehicleId,
};
use crate::routing::{Direction, RoutingError, RoutingProvider};

use super::case::InsertHow;
use super::select::{Cost, Insertion};

/// Where the two new stops are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookedStops {
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
}

/// A pickup or dropoff that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub is_pickup: bool,
    pub coordinates: Coordinates,
    pub scheduled: Interval,
    pub communicated: DateTime<Utc>,
    pub prev_leg: Duration,
    pub next_leg: Duration,
    pub event_group: String,
}

/// New leg durations for an existing event next to an inserted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegPatch {
    pub event: EventId,
    pub prev_leg: Option<Duration>,
    pub next_leg: Option<Duration>,
}

/// Driving time from the last event of one tour to the first event of the
/// next tour of the same vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectUpdate {
    /// Into the tour being booked.
    BookedTour(Option<Duration>),
    /// Into an existing tour following the booked one.
    Tour {
        tour: TourId,
        duration: Option<Duration>,
    },
}

/// Everything a commit writes.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingPlan {
    pub company: CompanyId,
    pub vehicle: VehicleId,
    /// The commit fails if the vehicle moved past this revision.
    pub vehicle_revision: u64,
    /// `None` opens a new tour.
    pub tour: Option<TourId>,
    /// Tours that become one, the surviving one first. Empty unless at
    /// least two tours are involved.
    pub merge: Vec<TourId>,
    /// New tour start if the pickup leaves from the depot.
    pub departure: Option<DateTime<Utc>>,
    /// New tour end if the dropoff returns to the depot.
    pub arrival: Option<DateTime<Utc>>,
    pub demand: Capacities,
    pub pickup: NewEvent,
    pub dropoff: NewEvent,
    pub leg_patches: Vec<LegPatch>,
    /// Existing events joining another event group.
    pub group_updates: Vec<(EventId, String)>,
    pub direct_updates: Vec<DirectUpdate>,
    pub cost: Cost,
    /// First id the commit must hand out; set when planned against
    /// staged bookings.
    pub ids_from: Option<u64>,
}

fn fresh_group() -> String {
    Uuid::new_v4().to_string()
}

fn find(vehicle: &Vehicle, id: Option<EventId>) -> Option<&Event> {
    let id = id?;
    vehicle
        .events
        .iter()
        .chain(vehicle.last_event_before.as_ref())
        .chain(vehicle.first_event_after.as_ref())
        .find(|e| e.id == id)
}

/// Reuse the neighbour's group when the new stop is at its place.
fn group_for(neighbour: Option<&Event>, at: Coordinates) -> String {
    neighbour
        .filter(|e| e.coordinates.same_place(&at))
        .map_or_else(fresh_group, |e| e.event_group.clone())
}

/// Leg durations of the existing events around the new stops.
fn leg_patches(insertion: &Insertion) -> Vec<LegPatch> {
    let mut patches: Vec<LegPatch> = Vec::new();
    let mut patch = |event: Option<EventId>, prev_leg: Option<Duration>, next_leg: Option<Duration>| {
        let Some(event) = event else {
            return;
        };
        match patches.iter_mut().find(|p| p.event == event) {
            Some(p) => {
                p.prev_leg = prev_leg.or(p.prev_leg);
                p.next_leg = next_leg.or(p.next_leg);
            }
            None => patches.push(LegPatch {
                event,
                prev_leg,
                next_leg,
            }),
        }
    };

    let pickup = insertion.pickup_case;
    let dropoff = insertion.dropoff_case;
    if !pickup.comes_from_company() {
        patch(insertion.prev_pickup, None, Some(insertion.pickup_prev_leg));
    }
    if insertion.is_both() {
        if !dropoff.returns_to_company() {
            patch(insertion.next_dropoff, Some(insertion.dropoff_next_leg), None);
        }
        return patches;
    }
    if !pickup.returns_to_company() {
        patch(insertion.next_pickup, Some(insertion.pickup_next_leg), None);
    }
    if !dropoff.comes_from_company() {
        patch(insertion.prev_dropoff, None, Some(insertion.dropoff_prev_leg));
    }
    if !dropoff.returns_to_company() {
        patch(insertion.next_dropoff, Some(insertion.dropoff_next_leg), None);
    }
    patches
}

/// Tours whose events end up in the booked tour, in schedule order.
fn touched_tours(insertion: &Insertion, vehicle: &Vehicle) -> Vec<TourId> {
    let mut tours: Vec<TourId> = Vec::new();
    let mut touch = |event: Option<&Event>| {
        if let Some(e) = event {
            if !tours.contains(&e.tour) {
                tours.push(e.tour);
            }
        }
    };

    if !insertion.pickup_case.comes_from_company() {
        touch(find(vehicle, insertion.prev_pickup));
    }
    if let (Some(p), Some(d)) = (insertion.pickup_idx, insertion.dropoff_idx) {
        for e in vehicle.events.get(p..d).unwrap_or_default() {
            touch(Some(e));
        }
    }
    if !insertion.dropoff_case.returns_to_company() {
        touch(find(vehicle, insertion.next_dropoff));
    }
    tours
}

/// Events of the tour after `new_event` that sit at the same place and
/// therefore join its group.
fn connect_regroup(vehicle: &Vehicle, next: Option<&Event>, new_event: &NewEvent) -> Vec<(EventId, String)> {
    let Some(next) = next else {
        return Vec::new();
    };
    vehicle
        .events
        .iter()
        .chain(vehicle.first_event_after.as_ref())
        .skip_while(|e| e.id != next.id)
        .take_while(|e| e.tour == next.tour && e.coordinates.same_place(&new_event.coordinates))
        .filter(|e| e.event_group != new_event.event_group)
        .map(|e| (e.id, new_event.event_group.clone()))
        .collect()
}

/// The event the vehicle visits last before `time`, including the boundary
/// neighbour.
fn last_before(vehicle: &Vehicle, time: DateTime<Utc>) -> Option<&Event> {
    vehicle
        .events
        .iter()
        .rev()
        .find(|e| e.scheduled.end() <= time)
        .or(vehicle.last_event_before.as_ref())
}

fn first_after(vehicle: &Vehicle, time: DateTime<Utc>) -> Option<&Event> {
    vehicle
        .events
        .iter()
        .find(|e| e.scheduled.start() >= time)
        .or(vehicle.first_event_after.as_ref())
}

async fn direct<R: RoutingProvider>(
    router: &R,
    from: Coordinates,
    to: Coordinates,
) -> Result<Option<Duration>, RoutingError> {
    if from.same_place(&to) {
        return Ok(Some(Duration::zero()));
    }
    let durations = router.one_to_many(from, &[to], Direction::Forward).await?;
    Ok(durations.into_iter().next().flatten())
}

/// Build the commit for `insertion` on `vehicle`, the snapshot it was
/// evaluated against.
pub async fn plan_booking<R: RoutingProvider>(
    insertion: &Insertion,
    vehicle: &Vehicle,
    stops: BookedStops,
    demand: Capacities,
    router: &R,
) -> Result<BookingPlan, RoutingError> {
    let pickup_case = insertion.pickup_case;
    let dropoff_case = insertion.dropoff_case;

    let pickup_neighbour = if pickup_case.how() == InsertHow::Prepend {
        find(vehicle, insertion.next_pickup)
    } else {
        find(vehicle, insertion.prev_pickup)
    };
    let pickup = NewEvent {
        is_pickup: true,
        coordinates: stops.pickup,
        scheduled: insertion.scheduled_pickup,
        communicated: insertion.pickup_time,
        prev_leg: insertion.pickup_prev_leg,
        next_leg: insertion.pickup_next_leg,
        event_group: group_for(pickup_neighbour, stops.pickup),
    };

    let dropoff_group = if insertion.is_both() {
        if pickup.coordinates.same_place(&stops.dropoff) {
            pickup.event_group.clone()
        } else {
            fresh_group()
        }
    } else if dropoff_case.how() == InsertHow::Prepend {
        group_for(find(vehicle, insertion.next_dropoff), stops.dropoff)
    } else {
        group_for(find(vehicle, insertion.prev_dropoff), stops.dropoff)
    };
    let dropoff = NewEvent {
        is_pickup: false,
        coordinates: stops.dropoff,
        scheduled: insertion.scheduled_dropoff,
        communicated: insertion.dropoff_time,
        prev_leg: insertion.dropoff_prev_leg,
        next_leg: insertion.dropoff_next_leg,
        event_group: dropoff_group,
    };

    let tours = touched_tours(insertion, vehicle);
    let tour = insertion.tour.or_else(|| tours.first().copied());
    let merge = if tours.len() >= 2 {
        let mut merge = tours.clone();
        if let Some(pos) = tour.and_then(|t| merge.iter().position(|m| *m == t)) {
            let survivor = merge.remove(pos);
            merge.insert(0, survivor);
        }
        merge
    } else {
        Vec::new()
    };

    let mut group_updates = Vec::new();
    if pickup_case.how() == InsertHow::Connect && !insertion.is_both() {
        group_updates.extend(connect_regroup(vehicle, find(vehicle, insertion.next_pickup), &pickup));
    }
    if dropoff_case.how() == InsertHow::Connect {
        group_updates.extend(connect_regroup(vehicle, find(vehicle, insertion.next_dropoff), &dropoff));
    }

    let mut direct_updates = Vec::new();
    if pickup_case.comes_from_company() {
        let before = match insertion.pickup_idx {
            Some(p) => vehicle.prev_of(p),
            None => last_before(vehicle, insertion.scheduled_pickup.start()),
        };
        if let Some(before) = before {
            let duration = direct(router, before.coordinates, pickup.coordinates).await?;
            direct_updates.push(DirectUpdate::BookedTour(duration));
        }
    }
    if dropoff_case.returns_to_company() {
        let after = match insertion.dropoff_idx {
            Some(d) => vehicle.next_of(d),
            None => first_after(vehicle, insertion.scheduled_dropoff.end()),
        };
        if let Some(after) = after {
            let duration = direct(router, dropoff.coordinates, after.coordinates).await?;
            direct_updates.push(DirectUpdate::Tour {
                tour: after.tour,
                duration,
            });
        }
    }

    debug!(
        vehicle = %vehicle.id,
        tour = ?tour,
        merged = merge.len(),
        regrouped = group_updates.len(),
        "planned booking"
    );

    Ok(BookingPlan {
        company: insertion.company,
        vehicle: insertion.vehicle,
        vehicle_revision: insertion.vehicle_revision,
        tour,
        merge,
        departure: insertion.departure,
        arrival: insertion.arrival,
        demand,
        pickup,
        dropoff,
        leg_patches: leg_patches(insertion),
        group_updates,
        direct_updates,
        cost: insertion.cost,
        ids_from: None,
    })
}
