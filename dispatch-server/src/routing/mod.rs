//! Driving-time providers.
//!
//! The dispatcher only ever asks one kind of question: how long does it
//! take to drive between one point and each of many others. [`MotisClient`]
//! answers it with a MOTIS server, [`HaversineRouting`] with straight-line
//! estimates.

mod client;
mod error;
mod haversine;
mod provider;

pub use client::{MotisClient, MotisConfig};
pub use error::RoutingError;
pub use haversine::HaversineRouting;
pub use provider::{Direction, RoutingBackend, RoutingProvider};
