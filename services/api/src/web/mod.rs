pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::{cors_layer, request_context};
pub use rest::{
    analyze_session_handler, chat_handler, create_session_handler, health_handler,
    recommendation_handler, router,
};
