//! Application state for the web layer.

use std::sync::Arc;

use crate::dispatch::DispatchService;
use crate::routing::RoutingBackend;
use crate::store::MemoryStore;

/// The dispatcher the server runs.
pub type Dispatcher = DispatchService<MemoryStore, RoutingBackend>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatch: Dispatcher) -> Self {
        Self {
            dispatch: Arc::new(dispatch),
        }
    }
}
