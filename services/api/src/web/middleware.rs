//! services/api/src/web/middleware.rs
//!
//! Request-scoped context for log annotation, plus the CORS policy that
//! lets browsers send the tenant header.

use adaptive_learning_core::domain::RequestContext;
use axum::{
    extract::Request,
    http::{
        header::{InvalidHeaderValue, ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::Next,
    response::Response,
};
use tower_http::cors::CorsLayer;

/// Header carrying the optional tenant tag.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Middleware that builds a fresh `RequestContext` for every request.
///
/// The context is inserted into request extensions for handlers to pass on
/// to the tutoring service. It only ever feeds log fields.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let tenant_id = req
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    req.extensions_mut().insert(RequestContext::new(tenant_id));

    next.run(req).await
}

/// CORS for the single configured frontend origin.
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin = allowed_origin.parse::<HeaderValue>()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(TENANT_HEADER),
        ]))
}
