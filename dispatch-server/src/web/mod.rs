//! Web layer for the dispatcher.
//!
//! Provides HTTP endpoints for availability checks and bookings.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, Dispatcher};
