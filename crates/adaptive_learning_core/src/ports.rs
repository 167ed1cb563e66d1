//! crates/adaptive_learning_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the relational store and the hosted language model.

use async_trait::async_trait;

use crate::domain::{ChatTurn, LearningGoal, Session, SessionGoalDetails};
use crate::prompts::Prompt;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Constraint violated: {0}")]
    Constraint(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Store access for goals, sessions and chat turns.
///
/// Every write is committed before the call returns; callers never observe
/// a partial write.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Learning Goals ---
    /// Exact-name lookup. `NotFound` when no goal carries that name.
    async fn find_learning_goal_by_name(&self, name: &str) -> PortResult<LearningGoal>;

    // --- Sessions ---
    /// `Constraint` when `goal_id` does not reference an existing goal.
    async fn create_session(&self, goal_id: i64, initial_level: &str) -> PortResult<Session>;

    async fn get_session_by_id(&self, session_id: i64) -> PortResult<Session>;

    /// Joined goal + session read. `NotFound` if either side is missing.
    async fn get_goal_details_by_session_id(
        &self,
        session_id: i64,
    ) -> PortResult<SessionGoalDetails>;

    // --- Chat History ---
    /// `Constraint` when `session_id` does not reference an existing session.
    async fn append_chat_turn(
        &self,
        session_id: i64,
        model_response: &str,
        learner_response: &str,
    ) -> PortResult<ChatTurn>;

    /// Newest first, at most `limit` turns. Empty when the session has none.
    async fn get_recent_chat_turns(&self, session_id: i64, limit: u32)
        -> PortResult<Vec<ChatTurn>>;

    /// Newest first. Empty when the session has none.
    async fn get_all_chat_turns(&self, session_id: i64) -> PortResult<Vec<ChatTurn>>;
}

/// The hosted language model.
#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Sends the composed prompt and returns the generated text.
    ///
    /// In `ResponseMode::StrictJson` the text is a bare JSON object.
    /// Any transport, auth or model fault comes back as `PortError::Unexpected`.
    async fn generate(&self, prompt: &Prompt) -> PortResult<String>;
}
