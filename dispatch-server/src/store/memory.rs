//! In-memory snapshot store.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use geo::{Contains, Point, Polygon};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dispatch::{BookingPlan, DirectUpdate, NewEvent, is_valid};
use crate::domain::{
    Capacities, Company, CompanyId, Coordinates, Event, EventId, Interval, RequestId, TourId,
    Vehicle, VehicleId,
};

use super::file::{load_snapshot, save_snapshot};
use super::timeline::{Bucket, buckets};
use super::{
    BookingReceipt, BookingWriter, SnapshotQuery, SnapshotReader, StagedSnapshot, StoreError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyRecord {
    pub id: CompanyId,
    pub depot: Coordinates,
    /// Service area; `None` serves everywhere.
    pub zone: Option<Polygon<f64>>,
}

impl CompanyRecord {
    fn covers(&self, point: Coordinates) -> bool {
        self.zone
            .as_ref()
            .is_none_or(|zone| zone.contains(&Point::new(point.lng(), point.lat())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    pub id: VehicleId,
    pub company: CompanyId,
    pub capacities: Capacities,
    pub availabilities: Vec<Interval>,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TourRecord {
    pub id: TourId,
    pub vehicle: VehicleId,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    /// Driving time from the vehicle's previous tour into this one.
    pub direct_duration: Option<Duration>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub id: RequestId,
    pub tour: TourId,
    pub demand: Capacities,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: EventId,
    pub request: RequestId,
    pub is_pickup: bool,
    pub coordinates: Coordinates,
    pub scheduled: Interval,
    pub communicated: DateTime<Utc>,
    pub prev_leg: Duration,
    pub next_leg: Duration,
    pub event_group: String,
    pub cancelled: bool,
}

/// Everything the store holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Records {
    pub companies: Vec<CompanyRecord>,
    pub vehicles: Vec<VehicleRecord>,
    pub tours: Vec<TourRecord>,
    pub requests: Vec<RequestRecord>,
    pub events: Vec<EventRecord>,
}

impl Records {
    /// One past the largest id in use.
    fn next_id(&self) -> u64 {
        let ids = self
            .tours
            .iter()
            .map(|t| t.id.0)
            .chain(self.requests.iter().map(|r| r.id.0))
            .chain(self.events.iter().map(|e| e.id.0));
        ids.max().map_or(1, |max| max + 1)
    }

    fn vehicle_mut(&mut self, id: VehicleId) -> Result<&mut VehicleRecord, StoreError> {
        self.vehicles
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(StoreError::NotFound {
                kind: "vehicle",
                id: id.0,
            })
    }

    fn tour_mut(&mut self, id: TourId) -> Result<&mut TourRecord, StoreError> {
        self.tours
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound {
                kind: "tour",
                id: id.0,
            })
    }

    fn event_mut(&mut self, id: EventId) -> Result<&mut EventRecord, StoreError> {
        self.events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound {
                kind: "event",
                id: id.0,
            })
    }

    /// Active events of `tour`, sorted by scheduled start, as domain events.
    pub(crate) fn tour_events(&self, tour: &TourRecord) -> Vec<Event> {
        let requests: HashMap<RequestId, &RequestRecord> = self
            .requests
            .iter()
            .filter(|r| r.tour == tour.id && !r.cancelled)
            .map(|r| (r.id, r))
            .collect();
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| !e.cancelled)
            .filter_map(|e| {
                let request = requests.get(&e.request)?;
                Some(Event {
                    id: e.id,
                    request: e.request,
                    tour: tour.id,
                    is_pickup: e.is_pickup,
                    coordinates: e.coordinates,
                    scheduled: e.scheduled,
                    communicated: e.communicated,
                    demand: request.demand,
                    prev_leg: e.prev_leg,
                    next_leg: e.next_leg,
                    event_group: e.event_group.clone(),
                    departure: tour.departure,
                    arrival: tour.arrival,
                    direct_duration: None,
                })
            })
            .collect();
        events.sort_by_key(|e| e.scheduled.start());
        if let Some(first) = events.first_mut() {
            first.direct_duration = tour.direct_duration;
        }
        events
    }

    fn active_tours(&self, vehicle: VehicleId) -> impl Iterator<Item = &TourRecord> {
        self.tours
            .iter()
            .filter(move |t| t.vehicle == vehicle && !t.cancelled)
    }

    fn vehicle_snapshot(&self, record: &VehicleRecord, query: &SnapshotQuery) -> Vehicle {
        let availabilities: Vec<Interval> = record
            .availabilities
            .iter()
            .filter(|a| a.overlaps(&query.availability))
            .copied()
            .collect();

        let events: Vec<Event> = self
            .active_tours(record.id)
            .filter(|t| t.departure < query.tours.end() && t.arrival > query.tours.start())
            .flat_map(|t| self.tour_events(t))
            .collect();

        let last_event_before = self
            .active_tours(record.id)
            .filter(|t| t.arrival <= query.tours.start())
            .flat_map(|t| self.tour_events(t))
            .max_by_key(|e| e.communicated);
        let first_event_after = self
            .active_tours(record.id)
            .filter(|t| t.departure >= query.tours.end())
            .flat_map(|t| self.tour_events(t))
            .min_by_key(|e| e.communicated);

        let mut vehicle =
            Vehicle::new(record.id, record.capacities, &availabilities).with_events(events);
        vehicle.last_event_before = last_event_before;
        vehicle.first_event_after = first_event_after;
        vehicle.revision = record.revision;
        vehicle
    }

    fn companies(&self, query: &SnapshotQuery) -> Vec<Company> {
        self.companies
            .iter()
            .filter(|c| c.covers(query.user_chosen))
            .filter_map(|c| {
                let vehicles: Vec<Vehicle> = self
                    .vehicles
                    .iter()
                    .filter(|v| v.company == c.id && is_valid(&v.capacities, &query.required))
                    .map(|v| self.vehicle_snapshot(v, query))
                    .collect();
                if vehicles.is_empty() {
                    return None;
                }
                Some(Company {
                    id: c.id,
                    coordinates: c.depot,
                    vehicles,
                    serves_boarding_points: query.bus_stops.iter().map(|b| c.covers(*b)).collect(),
                })
            })
            .collect()
    }

    fn insert_event(&mut self, id: EventId, request: RequestId, event: NewEvent) {
        self.events.push(EventRecord {
            id,
            request,
            is_pickup: event.is_pickup,
            coordinates: event.coordinates,
            scheduled: event.scheduled,
            communicated: event.communicated,
            prev_leg: event.prev_leg,
            next_leg: event.next_leg,
            event_group: event.event_group,
            cancelled: false,
        });
    }

    fn apply(&mut self, plan: BookingPlan) -> Result<BookingReceipt, StoreError> {
        if let Some(expected) = plan.ids_from {
            let actual = self.next_id();
            if actual != expected {
                return Err(StoreError::Stale { expected, actual });
            }
        }
        let vehicle = self.vehicle_mut(plan.vehicle)?;
        if vehicle.revision != plan.vehicle_revision {
            return Err(StoreError::Conflict {
                vehicle: plan.vehicle,
                expected: plan.vehicle_revision,
                actual: vehicle.revision,
            });
        }
        vehicle.revision += 1;

        let mut next_id = self.next_id();
        let mut fresh = || {
            let id = next_id;
            next_id += 1;
            id
        };

        let tour = match plan.tour {
            Some(id) => id,
            None => {
                let id = TourId(fresh());
                self.tours.push(TourRecord {
                    id,
                    vehicle: plan.vehicle,
                    departure: plan.pickup.scheduled.start() - plan.pickup.prev_leg,
                    arrival: plan.dropoff.scheduled.end() + plan.dropoff.next_leg,
                    direct_duration: None,
                    cancelled: false,
                });
                id
            }
        };

        for merged in plan.merge.iter().filter(|m| **m != tour) {
            let (departure, arrival) = {
                let other = self.tour_mut(*merged)?;
                other.cancelled = true;
                (other.departure, other.arrival)
            };
            for request in self.requests.iter_mut().filter(|r| r.tour == *merged) {
                request.tour = tour;
            }
            let target = self.tour_mut(tour)?;
            target.departure = target.departure.min(departure);
            target.arrival = target.arrival.max(arrival);
        }

        let target = self.tour_mut(tour)?;
        if let Some(departure) = plan.departure {
            target.departure = departure;
        }
        if let Some(arrival) = plan.arrival {
            target.arrival = arrival;
        }

        let request = RequestId(fresh());
        let pickup = EventId(fresh());
        let dropoff = EventId(fresh());
        self.requests.push(RequestRecord {
            id: request,
            tour,
            demand: plan.demand,
            cancelled: false,
        });
        self.insert_event(pickup, request, plan.pickup);
        self.insert_event(dropoff, request, plan.dropoff);

        for patch in &plan.leg_patches {
            let event = self.event_mut(patch.event)?;
            if let Some(prev_leg) = patch.prev_leg {
                event.prev_leg = prev_leg;
            }
            if let Some(next_leg) = patch.next_leg {
                event.next_leg = next_leg;
            }
        }
        for (id, group) in plan.group_updates {
            self.event_mut(id)?.event_group = group;
        }
        for update in plan.direct_updates {
            match update {
                DirectUpdate::BookedTour(duration) => self.tour_mut(tour)?.direct_duration = duration,
                DirectUpdate::Tour {
                    tour: other,
                    duration,
                } => self.tour_mut(other)?.direct_duration = duration,
            }
        }

        Ok(BookingReceipt {
            request,
            tour,
            pickup,
            dropoff,
        })
    }

    fn cancel(&mut self, id: RequestId) -> Result<(), StoreError> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound {
                kind: "request",
                id: id.0,
            })?;
        request.cancelled = true;
        let tour = request.tour;
        for event in self.events.iter_mut().filter(|e| e.request == id) {
            event.cancelled = true;
        }

        let emptied = !self.requests.iter().any(|r| r.tour == tour && !r.cancelled);
        let record = self.tour_mut(tour)?;
        if emptied {
            record.cancelled = true;
        }
        let vehicle = record.vehicle;
        self.vehicle_mut(vehicle)?.revision += 1;
        Ok(())
    }
}

/// A store over [`Records`] held in memory. Commits and cancellations are
/// serialized by one lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
}

impl MemoryStore {
    pub fn new(records: Records) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Open a store from a JSON snapshot file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let records = load_snapshot(path)?;
        info!(
            path = %path.display(),
            vehicles = records.vehicles.len(),
            tours = records.tours.len(),
            "snapshot loaded"
        );
        Ok(Self::new(records))
    }

    /// Write the current records to a JSON snapshot file.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let records = self.records().await;
        save_snapshot(path, &records)
    }

    /// A copy of the current records.
    pub async fn records(&self) -> Records {
        self.records.lock().await.clone()
    }

    /// Occupancy of `vehicle` over `range` in buckets of `width`.
    pub async fn timeline(&self, vehicle: VehicleId, range: Interval, width: Duration) -> Vec<Bucket> {
        buckets(&*self.records.lock().await, vehicle, range, width)
    }

    /// Run `f` on a copy of the records and keep the copy only if `f`
    /// succeeds.
    async fn transact<T>(
        &self,
        f: impl FnOnce(&mut Records) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut records = self.records.lock().await;
        let mut staged = records.clone();
        let out = f(&mut staged)?;
        *records = staged;
        Ok(out)
    }

    /// Soft-delete both events of a request. A tour left without requests
    /// is cancelled as well.
    pub async fn cancel_request(&self, id: RequestId) -> Result<(), StoreError> {
        self.records.lock().await.cancel(id)?;
        debug!(request = %id, "request cancelled");
        Ok(())
    }
}

impl SnapshotReader for MemoryStore {
    async fn companies(&self, query: &SnapshotQuery) -> Result<Vec<Company>, StoreError> {
        let companies = self.records.lock().await.companies(query);
        debug!(companies = companies.len(), "snapshot read");
        Ok(companies)
    }

    async fn companies_after(
        &self,
        query: &SnapshotQuery,
        pending: &[BookingPlan],
    ) -> Result<StagedSnapshot, StoreError> {
        let mut staged = self.records.lock().await.clone();
        for plan in pending {
            staged.apply(plan.clone())?;
        }
        let companies = staged.companies(query);
        debug!(companies = companies.len(), pending = pending.len(), "staged snapshot read");
        Ok(StagedSnapshot {
            companies,
            next_id: staged.next_id(),
        })
    }
}

impl BookingWriter for MemoryStore {
    async fn commit(&self, plans: Vec<BookingPlan>) -> Result<Vec<BookingReceipt>, StoreError> {
        let committed = self
            .transact(|records| {
                plans
                    .into_iter()
                    .map(|plan| records.apply(plan))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await;
        match committed {
            Ok(receipts) => {
                for receipt in &receipts {
                    debug!(request = %receipt.request, tour = %receipt.tour, "booking committed");
                }
                Ok(receipts)
            }
            Err(e) => {
                warn!(error = %e, "booking rejected");
                Err(e)
            }
        }
    }
}
