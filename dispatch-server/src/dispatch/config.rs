//! Tunables for insertion evaluation.

use chrono::Duration;

/// Configuration parameters for dispatching.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Minimum lead time between now and the earliest operation (minutes).
    pub min_prep_mins: i64,

    /// Longest single leg the dispatcher will plan (seconds).
    /// Longer approach, return or travel legs make a candidate infeasible.
    pub max_travel_secs: i64,

    /// How long before a boarding time a passenger may be picked up (minutes).
    pub max_passenger_waiting_pickup_mins: i64,

    /// How long after a boarding time a passenger may be dropped off (minutes).
    pub max_passenger_waiting_dropoff_mins: i64,

    /// Time to let passengers get in or out (minutes).
    pub passenger_change_mins: i64,

    /// Slack added to every non-zero leg (minutes).
    pub buffer_mins: i64,

    /// Width of a scheduled pickup window (minutes).
    pub scheduled_buffer_pickup_mins: i64,

    /// Upper bound on the width of a scheduled dropoff window (minutes).
    pub scheduled_buffer_dropoff_max_mins: i64,

    /// Idle time an insertion may add to a vehicle's schedule (minutes).
    pub max_taxi_waiting_mins: i64,

    pub taxi_driving_cost_factor: f64,
    pub taxi_waiting_cost_factor: f64,
    pub passenger_time_cost_factor: f64,

    /// Availabilities are read over the search interval widened by this
    /// many multiples of the maximum travel time.
    pub availability_horizon_factor: i32,

    /// Tours are read, and insertions evaluated, over the search interval
    /// widened by this many multiples of the maximum travel time.
    pub tour_horizon_factor: i32,
}

impl DispatchConfig {
    /// Create a configuration with the given timing parameters and default
    /// cost weights and horizons.
    pub fn new(
        min_prep_mins: i64,
        max_travel_secs: i64,
        passenger_change_mins: i64,
        buffer_mins: i64,
        max_taxi_waiting_mins: i64,
    ) -> Self {
        Self {
            min_prep_mins,
            max_travel_secs,
            passenger_change_mins,
            buffer_mins,
            max_taxi_waiting_mins,
            ..Self::default()
        }
    }

    pub fn min_prep(&self) -> Duration {
        Duration::minutes(self.min_prep_mins)
    }

    pub fn max_travel(&self) -> Duration {
        Duration::seconds(self.max_travel_secs)
    }

    pub fn max_passenger_waiting_pickup(&self) -> Duration {
        Duration::minutes(self.max_passenger_waiting_pickup_mins)
    }

    pub fn max_passenger_waiting_dropoff(&self) -> Duration {
        Duration::minutes(self.max_passenger_waiting_dropoff_mins)
    }

    pub fn passenger_change(&self) -> Duration {
        Duration::minutes(self.passenger_change_mins)
    }

    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.buffer_mins)
    }

    pub fn scheduled_buffer_pickup(&self) -> Duration {
        Duration::minutes(self.scheduled_buffer_pickup_mins)
    }

    /// Width of the scheduled dropoff window for a ride of `ride` length:
    /// a quarter of the ride, capped.
    pub fn scheduled_buffer_dropoff(&self, ride: Duration) -> Duration {
        let ride = ride.max(Duration::zero());
        (ride / 4).min(Duration::minutes(self.scheduled_buffer_dropoff_max_mins))
    }

    pub fn max_taxi_waiting(&self) -> Duration {
        Duration::minutes(self.max_taxi_waiting_mins)
    }

    pub fn availability_horizon(&self) -> Duration {
        self.max_travel() * self.availability_horizon_factor
    }

    pub fn tour_horizon(&self) -> Duration {
        self.max_travel() * self.tour_horizon_factor
    }

    /// Add the buffer to a non-zero approach leg.
    pub fn pad_approach(&self, leg: Duration) -> Duration {
        if leg.is_zero() { leg } else { leg + self.buffer() }
    }

    /// Add buffer and passenger change time to a non-zero return leg.
    pub fn pad_return(&self, leg: Duration) -> Duration {
        if leg.is_zero() {
            leg
        } else {
            leg + self.buffer() + self.passenger_change()
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_prep_mins: 30,
            max_travel_secs: 3600, // 1 hour
            max_passenger_waiting_pickup_mins: 10,
            max_passenger_waiting_dropoff_mins: 10,
            passenger_change_mins: 2,
            buffer_mins: 4,
            scheduled_buffer_pickup_mins: 10,
            scheduled_buffer_dropoff_max_mins: 10,
            max_taxi_waiting_mins: 120, // 2 hours
            taxi_driving_cost_factor: 1.0,
            taxi_waiting_cost_factor: 0.2,
            passenger_time_cost_factor: 1.0,
            availability_horizon_factor: 3,
            tour_horizon_factor: 6,
        }
    }
}
