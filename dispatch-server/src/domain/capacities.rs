//! Seat, wheelchair, bike and luggage counts.

use std::ops::{Add, Neg, Sub};

/// Error returned when request capacities are out of range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid capacities: {field} {reason}")]
pub struct InvalidCapacities {
    pub field: &'static str,
    pub reason: &'static str,
}

/// A four-dimensional capacity vector.
///
/// The same type describes what a vehicle offers, what a request needs,
/// and (signed) what an event adds to or removes from a vehicle's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Capacities {
    pub passengers: i32,
    pub wheelchairs: i32,
    pub bikes: i32,
    pub luggage: i32,
}

impl Capacities {
    pub fn new(passengers: i32, wheelchairs: i32, bikes: i32, luggage: i32) -> Self {
        Self {
            passengers,
            wheelchairs,
            bikes,
            luggage,
        }
    }

    /// Validate capacities demanded by a request.
    ///
    /// At least one passenger must travel; every other dimension must be
    /// non-negative.
    ///
    /// ```
    /// use dispatch_server::domain::Capacities;
    ///
    /// assert!(Capacities::new(1, 0, 0, 0).validate_demand().is_ok());
    /// assert!(Capacities::new(0, 0, 0, 0).validate_demand().is_err());
    /// assert!(Capacities::new(2, 0, -1, 0).validate_demand().is_err());
    /// ```
    pub fn validate_demand(self) -> Result<Self, InvalidCapacities> {
        if self.passengers < 1 {
            return Err(InvalidCapacities {
                field: "passengers",
                reason: "must be at least 1",
            });
        }
        for (field, value) in [
            ("wheelchairs", self.wheelchairs),
            ("bikes", self.bikes),
            ("luggage", self.luggage),
        ] {
            if value < 0 {
                return Err(InvalidCapacities {
                    field,
                    reason: "must not be negative",
                });
            }
        }
        Ok(self)
    }

    /// Whether this load fits into `vehicle`.
    ///
    /// Luggage may spill onto passenger seats that are not taken.
    ///
    /// ```
    /// use dispatch_server::domain::Capacities;
    ///
    /// let vehicle = Capacities::new(3, 0, 0, 1);
    /// assert!(Capacities::new(1, 0, 0, 3).fits_into(&vehicle));
    /// assert!(!Capacities::new(2, 0, 0, 3).fits_into(&vehicle));
    /// ```
    pub fn fits_into(&self, vehicle: &Capacities) -> bool {
        self.passengers <= vehicle.passengers
            && self.wheelchairs <= vehicle.wheelchairs
            && self.bikes <= vehicle.bikes
            && self.luggage + self.passengers - vehicle.passengers <= vehicle.luggage
    }
}

impl Add for Capacities {
    type Output = Capacities;

    fn add(self, rhs: Capacities) -> Capacities {
        Capacities {
            passengers: self.passengers + rhs.passengers,
            wheelchairs: self.wheelchairs + rhs.wheelchairs,
            bikes: self.bikes + rhs.bikes,
            luggage: self.luggage + rhs.luggage,
        }
    }
}

impl Sub for Capacities {
    type Output = Capacities;

    fn sub(self, rhs: Capacities) -> Capacities {
        self + (-rhs)
    }
}

impl Neg for Capacities {
    type Output = Capacities;

    fn neg(self) -> Capacities {
        Capacities {
            passengers: -self.passengers,
            wheelchairs: -self.wheelchairs,
            bikes: -self.bikes,
            luggage: -self.luggage,
        }
    }
}
