//! JSON snapshot files.
//!
//! Times are RFC 3339, durations are whole milliseconds and zones are
//! rings of `[lng, lat]` pairs.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use geo::{LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::domain::{Capacities, CompanyId, Coordinates, EventId, Interval, RequestId, TourId, VehicleId};

use super::StoreError;
use super::memory::{CompanyRecord, EventRecord, Records, RequestRecord, TourRecord, VehicleRecord};

/// On-disk form of [`Records`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub companies: Vec<CompanyEntry>,
    pub vehicles: Vec<VehicleEntry>,
    #[serde(default)]
    pub tours: Vec<TourEntry>,
    #[serde(default)]
    pub requests: Vec<RequestEntry>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapacitiesEntry {
    pub passengers: i32,
    #[serde(default)]
    pub wheelchairs: i32,
    #[serde(default)]
    pub bikes: i32,
    #[serde(default)]
    pub luggage: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntervalEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyEntry {
    pub id: u64,
    pub depot: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleEntry {
    pub id: u64,
    pub company: u64,
    pub capacities: CapacitiesEntry,
    pub availabilities: Vec<IntervalEntry>,
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourEntry {
    pub id: u64,
    pub vehicle: u64,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    #[serde(default)]
    pub direct_duration_ms: Option<i64>,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEntry {
    pub id: u64,
    pub tour: u64,
    pub demand: CapacitiesEntry,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub id: u64,
    pub request: u64,
    pub is_pickup: bool,
    pub coordinates: LatLng,
    pub scheduled: IntervalEntry,
    pub communicated: DateTime<Utc>,
    pub prev_leg_ms: i64,
    pub next_leg_ms: i64,
    pub event_group: String,
    #[serde(default)]
    pub cancelled: bool,
}

fn parse_error(what: impl std::fmt::Display, id: u64, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Parse {
        message: format!("{what} {id}: {reason}"),
    }
}

fn coordinates(at: LatLng, what: &str, id: u64) -> Result<Coordinates, StoreError> {
    Coordinates::new(at.lat, at.lng).map_err(|e| parse_error(what, id, e))
}

fn interval(entry: IntervalEntry, what: &str, id: u64) -> Result<Interval, StoreError> {
    Interval::try_new(entry.start, entry.end).map_err(|e| parse_error(what, id, e))
}

fn capacities(entry: CapacitiesEntry) -> Capacities {
    Capacities::new(entry.passengers, entry.wheelchairs, entry.bikes, entry.luggage)
}

impl From<Capacities> for CapacitiesEntry {
    fn from(c: Capacities) -> Self {
        Self {
            passengers: c.passengers,
            wheelchairs: c.wheelchairs,
            bikes: c.bikes,
            luggage: c.luggage,
        }
    }
}

impl From<Coordinates> for LatLng {
    fn from(c: Coordinates) -> Self {
        Self {
            lat: c.lat(),
            lng: c.lng(),
        }
    }
}

impl From<Interval> for IntervalEntry {
    fn from(i: Interval) -> Self {
        Self {
            start: i.start(),
            end: i.end(),
        }
    }
}

impl SnapshotFile {
    /// Validate and convert into store records.
    pub fn into_records(self) -> Result<Records, StoreError> {
        let companies = self
            .companies
            .into_iter()
            .map(|c| -> Result<CompanyRecord, StoreError> {
                Ok(CompanyRecord {
                    id: CompanyId(c.id),
                    depot: coordinates(c.depot, "company", c.id)?,
                    zone: c.zone.map(|ring| {
                        let ring: Vec<(f64, f64)> = ring.into_iter().map(|[x, y]| (x, y)).collect();
                        Polygon::new(LineString::from(ring), vec![])
                    }),
                })
            })
            .collect::<Result<_, _>>()?;

        let vehicles = self
            .vehicles
            .into_iter()
            .map(|v| -> Result<VehicleRecord, StoreError> {
                let availabilities = v
                    .availabilities
                    .into_iter()
                    .map(|a| interval(a, "vehicle", v.id))
                    .collect::<Result<_, _>>()?;
                Ok(VehicleRecord {
                    id: VehicleId(v.id),
                    company: CompanyId(v.company),
                    capacities: capacities(v.capacities),
                    availabilities,
                    revision: v.revision,
                })
            })
            .collect::<Result<_, _>>()?;

        let tours = self
            .tours
            .into_iter()
            .map(|t| -> Result<TourRecord, StoreError> {
                if t.arrival < t.departure {
                    return Err(parse_error("tour", t.id, "arrival before departure"));
                }
                Ok(TourRecord {
                    id: TourId(t.id),
                    vehicle: VehicleId(t.vehicle),
                    departure: t.departure,
                    arrival: t.arrival,
                    direct_duration: t.direct_duration_ms.map(Duration::milliseconds),
                    cancelled: t.cancelled,
                })
            })
            .collect::<Result<_, _>>()?;

        let requests = self
            .requests
            .into_iter()
            .map(|r| -> Result<RequestRecord, StoreError> {
                let demand = capacities(r.demand)
                    .validate_demand()
                    .map_err(|e| parse_error("request", r.id, e))?;
                Ok(RequestRecord {
                    id: RequestId(r.id),
                    tour: TourId(r.tour),
                    demand,
                    cancelled: r.cancelled,
                })
            })
            .collect::<Result<_, _>>()?;

        let events = self
            .events
            .into_iter()
            .map(|e| -> Result<EventRecord, StoreError> {
                Ok(EventRecord {
                    id: EventId(e.id),
                    request: RequestId(e.request),
                    is_pickup: e.is_pickup,
                    coordinates: coordinates(e.coordinates, "event", e.id)?,
                    scheduled: interval(e.scheduled, "event", e.id)?,
                    communicated: e.communicated,
                    prev_leg: Duration::milliseconds(e.prev_leg_ms),
                    next_leg: Duration::milliseconds(e.next_leg_ms),
                    event_group: e.event_group,
                    cancelled: e.cancelled,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Records {
            companies,
            vehicles,
            tours,
            requests,
            events,
        })
    }

    pub fn from_records(records: &Records) -> Self {
        Self {
            companies: records
                .companies
                .iter()
                .map(|c| CompanyEntry {
                    id: c.id.0,
                    depot: c.depot.into(),
                    zone: c
                        .zone
                        .as_ref()
                        .map(|zone| zone.exterior().points().map(|p| [p.x(), p.y()]).collect()),
                })
                .collect(),
            vehicles: records
                .vehicles
                .iter()
                .map(|v| VehicleEntry {
                    id: v.id.0,
                    company: v.company.0,
                    capacities: v.capacities.into(),
                    availabilities: v.availabilities.iter().map(|a| (*a).into()).collect(),
                    revision: v.revision,
                })
                .collect(),
            tours: records
                .tours
                .iter()
                .map(|t| TourEntry {
                    id: t.id.0,
                    vehicle: t.vehicle.0,
                    departure: t.departure,
                    arrival: t.arrival,
                    direct_duration_ms: t.direct_duration.map(|d| d.num_milliseconds()),
                    cancelled: t.cancelled,
                })
                .collect(),
            requests: records
                .requests
                .iter()
                .map(|r| RequestEntry {
                    id: r.id.0,
                    tour: r.tour.0,
                    demand: r.demand.into(),
                    cancelled: r.cancelled,
                })
                .collect(),
            events: records
                .events
                .iter()
                .map(|e| EventEntry {
                    id: e.id.0,
                    request: e.request.0,
                    is_pickup: e.is_pickup,
                    coordinates: e.coordinates.into(),
                    scheduled: e.scheduled.into(),
                    communicated: e.communicated,
                    prev_leg_ms: e.prev_leg.num_milliseconds(),
                    next_leg_ms: e.next_leg.num_milliseconds(),
                    event_group: e.event_group.clone(),
                    cancelled: e.cancelled,
                })
                .collect(),
        }
    }
}

/// Read a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<Records, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    let file: SnapshotFile = serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
        message: format!("{}: {e}", path.display()),
    })?;
    file.into_records()
}

/// Write a snapshot file, creating parent directories if needed.
pub fn save_snapshot(path: &Path, records: &Records) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&SnapshotFile::from_records(records)).map_err(|e| {
        StoreError::Parse {
            message: format!("failed to serialize snapshot: {e}"),
        }
    })?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::fixtures::*;
    use crate::store::memory::fixtures::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");
        let mut records = dresden();
        booked(
            &mut records,
            1,
            1,
            (coords(51.06, 13.75), at(9, 0)),
            (coords(51.07, 13.76), at(9, 30)),
        );
        records.tours[0].direct_duration = Some(Duration::milliseconds(90_500));

        save_snapshot(&path, &records).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded.tours, records.tours);
        assert_eq!(loaded.events, records.events);
        assert_eq!(loaded.vehicles, records.vehicles);
        assert_eq!(loaded.companies[0].zone, records.companies[0].zone);
    }

    #[test]
    fn reads_hand_written_file() {
        let json = r#"{
            "companies": [{ "id": 1, "depot": { "lat": 51.05, "lng": 13.74 } }],
            "vehicles": [{
                "id": 7,
                "company": 1,
                "capacities": { "passengers": 4 },
                "availabilities": [{ "start": "2026-03-02T06:00:00Z", "end": "2026-03-02T20:00:00Z" }]
            }]
        }"#;
        let file: SnapshotFile = serde_json::from_str(json).unwrap();
        let records = file.into_records().unwrap();
        assert_eq!(records.vehicles[0].id, VehicleId(7));
        assert_eq!(records.vehicles[0].capacities.passengers, 4);
        assert_eq!(records.vehicles[0].availabilities[0].start(), at(6, 0));
        assert!(records.companies[0].zone.is_none());
        assert!(records.tours.is_empty());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut file = SnapshotFile::from_records(&dresden());
        file.companies[0].depot.lat = 123.0;
        assert!(matches!(file.into_records(), Err(StoreError::Parse { .. })));

        let dir = tempdir().unwrap();
        let missing = load_snapshot(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(StoreError::Io(_))));
    }
}
