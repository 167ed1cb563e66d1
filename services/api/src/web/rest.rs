//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{middleware::request_context, state::AppState};
use adaptive_learning_core::{
    domain::{RequestContext, TranscriptAnalysis},
    service::ServiceError,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        create_session_handler,
        chat_handler,
        analyze_session_handler,
        recommendation_handler,
    ),
    components(
        schemas(
            HealthResponse,
            CreateSessionRequest,
            SessionResponse,
            ChatRequest,
            ChatResponse,
            AnalysisBody,
            AnalysisResponse,
            RecommendationResponse,
        )
    ),
    tags(
        (name = "Adaptive Learning Engine API", description = "Adaptive tutoring sessions backed by a hosted language model.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Builds the API routes with request tracing and the request-context middleware.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/create-session", post(create_session_handler))
        .route("/chat-with-gpt", post(chat_handler))
        .route("/analytics/student/{session_id}", post(analyze_session_handler))
        .route("/session/{id}/recommendation", post(recommendation_handler))
        .layer(axum_middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    message: String,
}

/// The request payload for opening a tutoring session.
#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub learner_level: String,
    pub learning_goal: String,
}

/// The response payload sent after successfully creating a session.
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    id: i64,
    learning_goal: String,
    student_initial_level: String,
    student_current_level: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub session_id: i64,
    pub learner_response: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    session_id: i64,
    learner_input: String,
    ai_response: String,
}

/// The structured transcript analysis returned by the model.
#[derive(Serialize, ToSchema)]
pub struct AnalysisBody {
    total_questions_asked: u32,
    total_questions_answered_wrong: u32,
    misconceptions: Vec<String>,
    feedback: String,
}

impl From<TranscriptAnalysis> for AnalysisBody {
    fn from(a: TranscriptAnalysis) -> Self {
        Self {
            total_questions_asked: a.total_questions_asked,
            total_questions_answered_wrong: a.total_questions_answered_wrong,
            misconceptions: a.misconceptions,
            feedback: a.feedback,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AnalysisResponse {
    session_id: i64,
    ai_response: AnalysisBody,
}

#[derive(Serialize, ToSchema)]
pub struct RecommendationResponse {
    ai_response: String,
}

/// Maps the three service outcomes onto HTTP statuses.
fn to_http_error(e: ServiceError) -> (StatusCode, String) {
    match e {
        ServiceError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        ServiceError::Upstream(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Health check.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "API is running", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Adaptive Learning Engine API is running".to_string(),
    })
}

/// Create a new tutoring session for a learning goal.
///
/// The learner's level becomes both the initial and the current level.
#[utoipa::path(
    post,
    path = "/create-session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created successfully", body = SessionResponse),
        (status = 400, description = "Invalid learning goal"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-tenant-id" = Option<String>, Header, description = "Optional tenant tag used in logs.")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    info!(event_type = "create_session", goal_name = %req.learning_goal, "Creating new session");

    let summary = app_state
        .tutoring
        .start_session(&ctx, &req.learner_level, &req.learning_goal)
        .await
        .map_err(|e| {
            error!(event_type = "create_session", goal_name = %req.learning_goal, "Failed to create session: {}", e);
            to_http_error(e)
        })?;

    let response = SessionResponse {
        id: summary.id,
        learning_goal: summary.goal_name,
        student_initial_level: summary.initial_level,
        student_current_level: summary.current_level,
    };
    Ok(Json(response))
}

/// Submit the learner's reply and get the tutor's next message.
#[utoipa::path(
    post,
    path = "/chat-with-gpt",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Tutor responded", body = ChatResponse),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    info!(event_type = "chat_request_received", session_id = req.session_id, "Received chat request");

    let exchange = app_state
        .tutoring
        .advance_chat(&ctx, req.session_id, &req.learner_response)
        .await
        .map_err(|e| {
            error!(event_type = "chat_endpoint_error", session_id = req.session_id, "Chat failed: {}", e);
            to_http_error(e)
        })?;

    Ok(Json(ChatResponse {
        session_id: exchange.session_id,
        learner_input: exchange.learner_response,
        ai_response: exchange.model_response,
    }))
}

/// Analyze the full transcript of a session.
#[utoipa::path(
    post,
    path = "/analytics/student/{session_id}",
    responses(
        (status = 200, description = "Transcript analyzed", body = AnalysisResponse),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("session_id" = i64, Path, description = "The session to analyze.")
    )
)]
pub async fn analyze_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = app_state
        .tutoring
        .analyze_session(&ctx, session_id)
        .await
        .map_err(|e| {
            error!(event_type = "analyze_session", session_id, "Analysis failed: {}", e);
            to_http_error(e)
        })?;

    Ok(Json(AnalysisResponse {
        session_id: result.session_id,
        ai_response: result.analysis.into(),
    }))
}

/// Recommend next steps and knowledge gaps for a session.
#[utoipa::path(
    post,
    path = "/session/{id}/recommendation",
    responses(
        (status = 200, description = "Recommendation generated", body = RecommendationResponse),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = i64, Path, description = "The session to build recommendations for.")
    )
)]
pub async fn recommendation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let recommendation = app_state.tutoring.recommend(&ctx, id).await.map_err(|e| {
        error!(event_type = "get_recommendation", session_id = id, "Recommendation failed: {}", e);
        to_http_error(e)
    })?;

    Ok(Json(RecommendationResponse {
        ai_response: recommendation,
    }))
}
