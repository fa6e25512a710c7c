//! Identifier newtypes for persisted entities.
//!
//! Distinct types keep a tour id from being passed where an event id is
//! expected; the store hands them out and nothing else interprets them.

use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a company (and its depot).
    CompanyId
);
id_type!(VehicleId);
id_type!(
    /// Identifies a tour. Merged tours keep the id of the surviving tour.
    TourId
);
id_type!(EventId);
id_type!(
    /// Identifies a booked request; both of its events carry it.
    RequestId
);
