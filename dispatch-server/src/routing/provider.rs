//! The routing provider seam.

use std::future::Future;

use chrono::Duration;

use crate::domain::Coordinates;

use super::client::MotisClient;
use super::error::RoutingError;
use super::haversine::HaversineRouting;

/// Which way a one-to-many query travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From the single origin to each destination.
    Forward,
    /// From each destination to the single origin.
    Backward,
}

/// Trait for providing driving durations.
///
/// This abstraction allows the dispatcher to be tested without a routing
/// server. `None` marks a destination the provider cannot reach; whether a
/// reachable one is too far is the dispatcher's decision.
pub trait RoutingProvider: Send + Sync {
    /// Durations between `one` and every entry of `many`, in order.
    fn one_to_many(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        direction: Direction,
    ) -> impl Future<Output = Result<Vec<Option<Duration>>, RoutingError>> + Send;
}

/// The providers the server can be started with.
#[derive(Debug, Clone)]
pub enum RoutingBackend {
    Motis(MotisClient),
    Haversine(HaversineRouting),
}

impl RoutingProvider for RoutingBackend {
    async fn one_to_many(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        direction: Direction,
    ) -> Result<Vec<Option<Duration>>, RoutingError> {
        match self {
            RoutingBackend::Motis(client) => client.one_to_many(one, many, direction).await,
            RoutingBackend::Haversine(h) => h.one_to_many(one, many, direction).await,
        }
    }
}
