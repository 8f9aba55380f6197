//! services/panel/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use crate::config::Config;
use crate::web::sessions::SessionStore;
use lead_review_core::ports::{AuthGateway, LeadRepository};

/// The shared application state, created once at startup and passed to all
/// handlers. Both ports are held as trait objects so tests can substitute
/// in-memory fakes for the upstream service.
#[derive(Clone)]
pub struct AppState {
    pub leads: Arc<dyn LeadRepository>,
    pub auth: Arc<dyn AuthGateway>,
    pub sessions: SessionStore,
    pub config: Arc<Config>,
}
