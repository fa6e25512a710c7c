//! Dial-a-ride dispatch server.
//!
//! Answers "which vehicle could take this passenger, and when" for an
//! on-demand taxi service that feeds public transport, and commits the
//! chosen insertion into the vehicle's tours.

pub mod clock;
pub mod dispatch;
pub mod domain;
pub mod routing;
pub mod store;
pub mod web;
