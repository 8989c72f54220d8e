//! Shared application state for the game API server.

use apiary_ledger::LedgerService;

/// State shared by every request handler.
///
/// The [`LedgerService`] carries its own interior synchronization, so
/// the state itself only needs to be wrapped in an `Arc` by the router.
#[derive(Debug)]
pub struct AppState {
    /// The authoritative economy underneath the API.
    pub service: LedgerService,
}

impl AppState {
    /// Build state around a configured ledger service.
    pub fn new(service: LedgerService) -> Self {
        Self { service }
    }
}
