//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::{
    BlacklistRequest, BlacklistResponse, BoardingPoint, BookingOutcome, BookingRequest, Insertion,
    WhitelistRequest, WhitelistResponse,
};
use crate::domain::{Capacities, Coordinates, DomainError, Interval};

/// A request field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the field, e.g. `startBusStops[1].coordinates.lat`.
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatLngDto {
    pub lat: f64,
    pub lng: f64,
}

impl LatLngDto {
    fn parse(self, path: &str) -> Result<Coordinates, FieldError> {
        Coordinates::new(self.lat, self.lng).map_err(|e| {
            let bad_lat = !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat);
            FieldError {
                field: format!("{path}.{}", if bad_lat { "lat" } else { "lng" }),
                message: e.to_string(),
            }
        })
    }
}

impl From<Coordinates> for LatLngDto {
    fn from(c: Coordinates) -> Self {
        Self {
            lat: c.lat(),
            lng: c.lng(),
        }
    }
}

/// Seats and space a request needs. Omitted counts are zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapacitiesDto {
    pub passengers: i32,
    #[serde(default)]
    pub wheelchairs: i32,
    #[serde(default)]
    pub bikes: i32,
    #[serde(default)]
    pub luggage: i32,
}

impl CapacitiesDto {
    fn parse(self) -> Result<Capacities, FieldError> {
        Capacities::new(self.passengers, self.wheelchairs, self.bikes, self.luggage)
            .validate_demand()
            .map_err(|e| FieldError {
                field: format!("capacities.{}", e.field),
                message: e.reason.to_string(),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusStopDto {
    pub coordinates: LatLngDto,
    pub times: Vec<DateTime<Utc>>,
}

fn parse_bus_stops(stops: Vec<BusStopDto>, name: &str) -> Result<Vec<BoardingPoint>, FieldError> {
    stops
        .into_iter()
        .enumerate()
        .map(|(i, stop)| {
            let path = format!("{name}[{i}]");
            if stop.times.is_empty() {
                return Err(FieldError {
                    field: format!("{path}.times"),
                    message: DomainError::NoCandidateTimes(i).to_string(),
                });
            }
            Ok(BoardingPoint {
                coordinates: stop.coordinates.parse(&format!("{path}.coordinates"))?,
                times: stop.times,
            })
        })
        .collect()
}

/// Request body of `POST /whitelist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistRequestDto {
    pub start: LatLngDto,
    pub target: LatLngDto,
    #[serde(default)]
    pub start_bus_stops: Vec<BusStopDto>,
    #[serde(default)]
    pub target_bus_stops: Vec<BusStopDto>,
    #[serde(default)]
    pub direct_times: Vec<DateTime<Utc>>,
    pub start_fixed: bool,
    pub capacities: CapacitiesDto,
}

impl WhitelistRequestDto {
    pub fn parse(self) -> Result<WhitelistRequest, FieldError> {
        Ok(WhitelistRequest {
            start: self.start.parse("start")?,
            target: self.target.parse("target")?,
            start_bus_stops: parse_bus_stops(self.start_bus_stops, "startBusStops")?,
            target_bus_stops: parse_bus_stops(self.target_bus_stops, "targetBusStops")?,
            direct_times: self.direct_times,
            start_fixed: self.start_fixed,
            required: self.capacities.parse()?,
        })
    }
}

/// Request body of `POST /blacklist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistRequestDto {
    pub start: LatLngDto,
    pub target: LatLngDto,
    #[serde(default)]
    pub start_bus_stops: Vec<LatLngDto>,
    #[serde(default)]
    pub target_bus_stops: Vec<LatLngDto>,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub start_fixed: bool,
    pub capacities: CapacitiesDto,
}

fn parse_points(points: Vec<LatLngDto>, name: &str) -> Result<Vec<Coordinates>, FieldError> {
    points
        .into_iter()
        .enumerate()
        .map(|(i, p)| p.parse(&format!("{name}[{i}]")))
        .collect()
}

impl BlacklistRequestDto {
    pub fn parse(self) -> Result<BlacklistRequest, FieldError> {
        if self.latest < self.earliest {
            return Err(FieldError {
                field: "latest".to_string(),
                message: "latest is before earliest".to_string(),
            });
        }
        Ok(BlacklistRequest {
            start: self.start.parse("start")?,
            target: self.target.parse("target")?,
            start_bus_stops: parse_points(self.start_bus_stops, "startBusStops")?,
            target_bus_stops: parse_points(self.target_bus_stops, "targetBusStops")?,
            start_fixed: self.start_fixed,
            earliest: self.earliest,
            latest: self.latest,
            required: self.capacities.parse()?,
        })
    }
}

/// Response body of `POST /blacklist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistResponseDto {
    pub start: Vec<bool>,
    pub target: Vec<bool>,
    pub direct: bool,
}

impl From<BlacklistResponse> for BlacklistResponseDto {
    fn from(r: BlacklistResponse) -> Self {
        Self {
            start: r.start,
            target: r.target,
            direct: r.direct,
        }
    }
}

/// The taxi from the arrival bus stop to the final destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDto {
    pub start: LatLngDto,
    pub target: LatLngDto,
    pub start_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
}

impl ConnectionDto {
    fn parse(
        self,
        prefix: &str,
        start_fixed: bool,
        required: Capacities,
    ) -> Result<BookingRequest, FieldError> {
        let path = |field: &str| {
            if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            }
        };
        if self.target_time < self.start_time {
            return Err(FieldError {
                field: path("targetTime"),
                message: "target time is before start time".to_string(),
            });
        }
        Ok(BookingRequest {
            start: self.start.parse(&path("start"))?,
            target: self.target.parse(&path("target"))?,
            start_time: self.start_time,
            target_time: self.target_time,
            start_fixed,
            required,
        })
    }
}

/// Request body of `POST /booking`.
///
/// A `lastMile` books a second taxi together with the first; it leaves
/// its bus stop at its `startTime`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestDto {
    pub start: LatLngDto,
    pub target: LatLngDto,
    pub start_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
    #[serde(default)]
    pub start_fixed: bool,
    #[serde(default)]
    pub last_mile: Option<ConnectionDto>,
    pub capacities: CapacitiesDto,
}

impl BookingRequestDto {
    /// The legs to book, in trip order.
    pub fn parse(self) -> Result<Vec<BookingRequest>, FieldError> {
        let required = self.capacities.parse()?;
        if self.start_fixed && self.last_mile.is_some() {
            return Err(FieldError {
                field: "startFixed".to_string(),
                message: "a first mile ends at a fixed time, not a fixed start".to_string(),
            });
        }
        let first = ConnectionDto {
            start: self.start,
            target: self.target,
            start_time: self.start_time,
            target_time: self.target_time,
        };
        let mut legs = vec![first.parse("", self.start_fixed, required)?];
        if let Some(last_mile) = self.last_mile {
            legs.push(last_mile.parse("lastMile", true, required)?);
        }
        Ok(legs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalDto {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<Interval> for IntervalDto {
    fn from(i: Interval) -> Self {
        Self {
            start: i.start(),
            end: i.end(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostDto {
    pub taxi_driving_secs: i64,
    pub taxi_waiting_secs: i64,
    pub passenger_secs: i64,
    pub total: f64,
}

/// The best insertion for one boarding point and time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionDto {
    pub company_id: u64,
    pub vehicle_id: u64,
    /// Absent when the ride opens a new tour.
    pub tour_id: Option<u64>,
    pub pickup_time: DateTime<Utc>,
    pub dropoff_time: DateTime<Utc>,
    pub scheduled_pickup: IntervalDto,
    pub scheduled_dropoff: IntervalDto,
    pub pickup_case: String,
    pub dropoff_case: String,
    pub cost: CostDto,
}

impl From<&Insertion> for InsertionDto {
    fn from(i: &Insertion) -> Self {
        Self {
            company_id: i.company.0,
            vehicle_id: i.vehicle.0,
            tour_id: i.tour.map(|t| t.0),
            pickup_time: i.pickup_time,
            dropoff_time: i.dropoff_time,
            scheduled_pickup: i.scheduled_pickup.into(),
            scheduled_dropoff: i.scheduled_dropoff.into(),
            pickup_case: i.pickup_case.to_string(),
            dropoff_case: i.dropoff_case.to_string(),
            cost: CostDto {
                taxi_driving_secs: i.cost.taxi_driving.num_seconds(),
                taxi_waiting_secs: i.cost.taxi_waiting.num_seconds(),
                passenger_secs: i.cost.passenger.num_seconds(),
                total: i.cost.total,
            },
        }
    }
}

fn row(cells: &[Option<Insertion>]) -> Vec<Option<InsertionDto>> {
    cells.iter().map(|c| c.as_ref().map(InsertionDto::from)).collect()
}

/// Response body of `POST /whitelist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistResponseDto {
    pub start: Vec<Vec<Option<InsertionDto>>>,
    pub target: Vec<Vec<Option<InsertionDto>>>,
    pub direct: Vec<Option<InsertionDto>>,
}

impl From<&WhitelistResponse> for WhitelistResponseDto {
    fn from(r: &WhitelistResponse) -> Self {
        Self {
            start: r.start.iter().map(|cells| row(cells)).collect(),
            target: r.target.iter().map(|cells| row(cells)).collect(),
            direct: row(&r.direct),
        }
    }
}

/// Response body of `POST /booking`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponseDto {
    pub request_id: u64,
    pub tour_id: u64,
    pub pickup_event_id: u64,
    pub dropoff_event_id: u64,
    pub insertion: InsertionDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mile: Option<Box<BookingResponseDto>>,
}

impl BookingResponseDto {
    /// The first leg, with any later leg nested as its last mile.
    pub fn from_trip(outcomes: &[BookingOutcome]) -> Option<Self> {
        let (first, rest) = outcomes.split_first()?;
        let mut response = Self::from(first);
        response.last_mile = Self::from_trip(rest).map(Box::new);
        Some(response)
    }
}

impl From<&BookingOutcome> for BookingResponseDto {
    fn from(o: &BookingOutcome) -> Self {
        Self {
            request_id: o.receipt.request.0,
            tour_id: o.receipt.tour.0,
            pickup_event_id: o.receipt.pickup.0,
            dropoff_event_id: o.receipt.dropoff.0,
            insertion: InsertionDto::from(&o.insertion),
            last_mile: None,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist_json(lat: f64) -> String {
        format!(
            r#"{{
                "start": {{ "lat": 51.06, "lng": 13.75 }},
                "target": {{ "lat": 51.08, "lng": 13.77 }},
                "startBusStops": [
                    {{ "coordinates": {{ "lat": 51.07, "lng": 13.76 }}, "times": ["2026-03-02T10:00:00Z"] }},
                    {{ "coordinates": {{ "lat": {lat}, "lng": 13.76 }}, "times": ["2026-03-02T10:30:00Z"] }}
                ],
                "startFixed": false,
                "capacities": {{ "passengers": 2 }}
            }}"#
        )
    }

    #[test]
    fn parses_whitelist_request() {
        let dto: WhitelistRequestDto = serde_json::from_str(&whitelist_json(51.07)).unwrap();
        let request = dto.parse().unwrap();
        assert_eq!(request.start_bus_stops.len(), 2);
        assert!(request.target_bus_stops.is_empty());
        assert!(request.direct_times.is_empty());
        assert_eq!(request.required, Capacities::new(2, 0, 0, 0));
    }

    #[test]
    fn names_the_failing_field() {
        let dto: WhitelistRequestDto = serde_json::from_str(&whitelist_json(95.0)).unwrap();
        let err = dto.parse().unwrap_err();
        assert_eq!(err.field, "startBusStops[1].coordinates.lat");

        let mut dto: WhitelistRequestDto = serde_json::from_str(&whitelist_json(51.07)).unwrap();
        dto.capacities.passengers = 0;
        assert_eq!(dto.parse().unwrap_err().field, "capacities.passengers");

        let mut dto: WhitelistRequestDto = serde_json::from_str(&whitelist_json(51.07)).unwrap();
        dto.target.lng = 200.0;
        assert_eq!(dto.parse().unwrap_err().field, "target.lng");

        let mut dto: WhitelistRequestDto = serde_json::from_str(&whitelist_json(51.07)).unwrap();
        dto.start_bus_stops[0].times.clear();
        assert_eq!(dto.parse().unwrap_err().field, "startBusStops[0].times");
    }

    fn booking_json(extra: &str) -> String {
        format!(
            r#"{{
                "start": {{ "lat": 51.06, "lng": 13.75 }},
                "target": {{ "lat": 51.07, "lng": 13.76 }},
                "startTime": "2026-03-02T09:44:00Z",
                "targetTime": "2026-03-02T10:00:00Z",
                {extra}
                "capacities": {{ "passengers": 2, "luggage": 1 }}
            }}"#
        )
    }

    const LAST_MILE: &str = r#""lastMile": {
        "start": { "lat": 51.07, "lng": 13.76 },
        "target": { "lat": 51.08, "lng": 13.77 },
        "startTime": "2026-03-02T11:00:00Z",
        "targetTime": "2026-03-02T11:16:00Z"
    },"#;

    #[test]
    fn booking_with_last_mile_has_two_legs() {
        let dto: BookingRequestDto = serde_json::from_str(&booking_json("")).unwrap();
        let legs = dto.parse().unwrap();
        assert_eq!(legs.len(), 1);
        assert!(!legs[0].start_fixed);

        let dto: BookingRequestDto = serde_json::from_str(&booking_json(LAST_MILE)).unwrap();
        let legs = dto.parse().unwrap();
        assert_eq!(legs.len(), 2);
        assert!(legs[1].start_fixed);
        assert_eq!(legs[1].required, legs[0].required);
        assert_eq!(legs[1].start, legs[0].target);
    }

    #[test]
    fn booking_fields_are_named_per_leg() {
        let with_fixed = format!(r#"{LAST_MILE} "startFixed": true,"#);
        let dto: BookingRequestDto = serde_json::from_str(&booking_json(&with_fixed)).unwrap();
        assert_eq!(dto.parse().unwrap_err().field, "startFixed");

        let mut dto: BookingRequestDto = serde_json::from_str(&booking_json(LAST_MILE)).unwrap();
        if let Some(last_mile) = dto.last_mile.as_mut() {
            last_mile.target_time = last_mile.start_time - chrono::Duration::minutes(1);
        }
        assert_eq!(dto.parse().unwrap_err().field, "lastMile.targetTime");

        let mut dto: BookingRequestDto = serde_json::from_str(&booking_json(LAST_MILE)).unwrap();
        if let Some(last_mile) = dto.last_mile.as_mut() {
            last_mile.start.lat = -91.0;
        }
        assert_eq!(dto.parse().unwrap_err().field, "lastMile.start.lat");

        let mut dto: BookingRequestDto = serde_json::from_str(&booking_json("")).unwrap();
        dto.target_time = dto.start_time - chrono::Duration::minutes(1);
        assert_eq!(dto.parse().unwrap_err().field, "targetTime");
    }

    #[test]
    fn parses_blacklist_request() {
        let json = r#"{
            "start": { "lat": 51.06, "lng": 13.75 },
            "target": { "lat": 51.08, "lng": 13.77 },
            "startBusStops": [{ "lat": 51.07, "lng": 13.76 }, { "lat": 51.07, "lng": 190.0 }],
            "earliest": "2026-03-02T08:00:00Z",
            "latest": "2026-03-02T12:00:00Z",
            "startFixed": false,
            "capacities": { "passengers": 1 }
        }"#;
        let dto: BlacklistRequestDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.clone().parse().unwrap_err().field, "startBusStops[1].lng");

        let mut fixed = dto.clone();
        fixed.start_bus_stops.pop();
        let request = fixed.parse().unwrap();
        assert_eq!(request.start_bus_stops.len(), 1);
        assert!(request.target_bus_stops.is_empty());

        let mut reversed = dto;
        reversed.start_bus_stops.clear();
        reversed.latest = reversed.earliest - chrono::Duration::hours(1);
        assert_eq!(reversed.parse().unwrap_err().field, "latest");
    }
}
