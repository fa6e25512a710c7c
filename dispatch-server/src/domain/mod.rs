//! Domain types for the dial-a-ride dispatcher.
//!
//! This module contains the value types and snapshot entities the
//! dispatcher reasons about. Validated types enforce their invariants at
//! construction time, so code that receives them can trust their validity.

mod capacities;
mod coordinates;
mod error;
pub(crate) mod event;
mod fleet;
mod ids;
mod interval;

pub use capacities::{Capacities, InvalidCapacities};
pub use coordinates::{COORDINATE_EPSILON, Coordinates, InvalidCoordinates};
pub use error::DomainError;
pub use event::Event;
pub use fleet::{Company, TourSpan, Vehicle};
pub use ids::{CompanyId, EventId, RequestId, TourId, VehicleId};
pub use interval::{Interval, InvalidInterval, Relation};
