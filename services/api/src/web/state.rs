//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use adaptive_learning_core::service::TutoringService;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub tutoring: TutoringService,
}
