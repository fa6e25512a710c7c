//! Geographic positions.

use std::fmt;

/// Tolerance (in degrees) under which two positions count as the same stop.
///
/// Routing providers snap positions to the road network and round them,
/// so coordinates that went through a provider never compare exactly equal.
pub const COORDINATE_EPSILON: f64 = 0.00001;

/// Error returned when a latitude/longitude pair is out of range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinates: {reason}")]
pub struct InvalidCoordinates {
    reason: &'static str,
}

/// A WGS84 latitude/longitude pair.
///
/// # Examples
///
/// ```
/// use dispatch_server::domain::Coordinates;
///
/// let depot = Coordinates::new(51.5, 14.6).unwrap();
/// assert_eq!(depot.lat(), 51.5);
///
/// assert!(Coordinates::new(91.0, 0.0).is_err());
/// assert!(Coordinates::new(0.0, -180.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    lat: f64,
    lng: f64,
}

impl Coordinates {
    /// Create coordinates, rejecting values outside -90..=90 / -180..=180.
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinates> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(InvalidCoordinates {
                reason: "must be finite numbers",
            });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidCoordinates {
                reason: "latitude must be within -90..=90",
            });
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(InvalidCoordinates {
                reason: "longitude must be within -180..=180",
            });
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Whether two positions denote the same physical stop.
    ///
    /// ```
    /// use dispatch_server::domain::Coordinates;
    ///
    /// let a = Coordinates::new(51.000001, 14.0).unwrap();
    /// let b = Coordinates::new(51.000004, 14.000002).unwrap();
    /// assert!(a.same_place(&b));
    /// assert!(!a.same_place(&Coordinates::new(51.001, 14.0).unwrap()));
    /// ```
    pub fn same_place(&self, other: &Coordinates) -> bool {
        (self.lat - other.lat).abs() < COORDINATE_EPSILON
            && (self.lng - other.lng).abs() < COORDINATE_EPSILON
    }

    /// Exact bit pattern, used to deduplicate routing destinations.
    pub(crate) fn key(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lng.to_bits())
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6};{:.6}", self.lat, self.lng)
    }
}
