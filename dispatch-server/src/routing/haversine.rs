//! Straight-line routing provider (used when no MOTIS server is available).
//!
//! Uses great-circle distance to estimate driving time. Less accurate
//! than MOTIS (ignores roads) but always available.

use chrono::Duration;

use crate::domain::Coordinates;

use super::error::RoutingError;
use super::provider::{Direction, RoutingProvider};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine-based routing provider.
///
/// Symmetric, so the query direction is ignored. Destinations further than
/// `max_travel` are reported unreachable, the way a routing server with a
/// search limit does.
///
/// ```
/// use chrono::Duration;
/// use dispatch_server::domain::Coordinates;
/// use dispatch_server::routing::HaversineRouting;
///
/// let router = HaversineRouting::new(60.0);
/// let a = Coordinates::new(51.0, 14.0).unwrap();
/// let b = Coordinates::new(51.1, 14.0).unwrap(); // ~11.1 km north
/// let d = router.duration(a, b);
/// assert!(d > Duration::minutes(10) && d < Duration::minutes(12));
/// ```
#[derive(Debug, Clone)]
pub struct HaversineRouting {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
    /// Longer trips are reported unreachable.
    pub max_travel: Duration,
}

impl Default for HaversineRouting {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            max_travel: Duration::hours(1),
        }
    }
}

impl HaversineRouting {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_kmh,
            ..Self::default()
        }
    }

    /// Calculate haversine distance between two points in kilometers.
    fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
        let lat1_rad = from.lat().to_radians();
        let lat2_rad = to.lat().to_radians();
        let delta_lat = (to.lat() - from.lat()).to_radians();
        let delta_lng = (to.lng() - from.lng()).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    /// Estimated driving time between two points.
    pub fn duration(&self, from: Coordinates, to: Coordinates) -> Duration {
        if from.same_place(&to) {
            return Duration::zero();
        }
        let hours = Self::haversine_km(from, to) / self.speed_kmh;
        Duration::seconds((hours * 3600.0).round() as i64)
    }
}

impl RoutingProvider for HaversineRouting {
    async fn one_to_many(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        _direction: Direction,
    ) -> Result<Vec<Option<Duration>>, RoutingError> {
        Ok(many
            .iter()
            .map(|other| Some(self.duration(one, *other)).filter(|d| *d <= self.max_travel))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn same_place_is_zero() {
        let router = HaversineRouting::default();
        assert_eq!(router.duration(c(51.0, 14.0), c(51.000001, 14.0)), Duration::zero());
    }

    #[test]
    fn one_degree_latitude() {
        // ~111 km at 40 km/h is ~2.8 hours
        let router = HaversineRouting {
            max_travel: Duration::hours(5),
            ..HaversineRouting::default()
        };
        let d = router.duration(c(51.0, 14.0), c(52.0, 14.0));
        assert!(d > Duration::minutes(160) && d < Duration::minutes(170), "{d}");
    }

    #[tokio::test]
    async fn too_far_is_unreachable() {
        let router = HaversineRouting::default();
        let result = router
            .one_to_many(c(51.0, 14.0), &[c(51.05, 14.0), c(52.0, 14.0)], Direction::Forward)
            .await
            .unwrap();
        assert!(result[0].is_some());
        assert!(result[1].is_none());
    }
}
