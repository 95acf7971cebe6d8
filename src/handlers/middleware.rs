//! Middleware for authentication, role gating, and security headers

use crate::handlers::auth::validate_session;
use crate::handlers::AppState;
use crate::models::{User, UserRole};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Authenticated user extracted by middleware, available via Extension<User>
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(user) => {
            let mut request = request;
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(response) => response,
    }
}

/// Managers and admins only
pub async fn require_staff(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(user) if user.role.is_staff() => {
            let mut request = request;
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(_) => forbidden(),
        Err(response) => response,
    }
}

/// Admins only
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(user) if user.role == UserRole::Admin => {
            let mut request = request;
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(_) => forbidden(),
        Err(response) => response,
    }
}

async fn authenticate(state: &AppState, headers: &header::HeaderMap) -> Result<User, Response> {
    match validate_session(&state.pool, headers).await {
        Some(user) => Ok(user),
        None => Err((
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"success": false, "error": "Not authenticated"})),
        )
            .into_response()),
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({"success": false, "error": "Insufficient permissions"})),
    )
        .into_response()
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
