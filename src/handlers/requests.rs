//! Maintenance and complaint request handlers

use crate::models::*;
use crate::validation::validate_create_request;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequestStatusRequest {
    pub status: RequestStatus,
}

// =============================================================================
// Request Endpoints
// =============================================================================

/// List requests: students see their own, staff see all
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListRequestsQuery>,
) -> impl IntoResponse {
    let requests: Vec<MaintenanceRequest> = if user.role.is_staff() {
        if let Some(status) = query.status {
            sqlx::query_as("SELECT * FROM requests WHERE status = $1 ORDER BY created_at DESC")
                .bind(status)
                .fetch_all(&state.pool)
                .await
                .unwrap_or_default()
        } else {
            sqlx::query_as("SELECT * FROM requests ORDER BY created_at DESC")
                .fetch_all(&state.pool)
                .await
                .unwrap_or_default()
        }
    } else if let Some(status) = query.status {
        sqlx::query_as(
            "SELECT * FROM requests WHERE user_id = $1 AND status = $2 ORDER BY created_at DESC",
        )
        .bind(user.id)
        .bind(status)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default()
    } else {
        sqlx::query_as("SELECT * FROM requests WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.id)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };

    (StatusCode::OK, Json(ApiResponse::success(requests)))
}

/// Raise a maintenance/complaint request; always starts pending
pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<CreateRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_create_request(&input) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<MaintenanceRequest>::error(e.to_string())),
        );
    }

    let room_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM rooms WHERE id = $1)")
        .bind(input.room_id)
        .fetch_one(&state.pool)
        .await
        .unwrap_or(false);
    if !room_exists {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Room not found")),
        );
    }

    let result = sqlx::query_as::<_, MaintenanceRequest>(
        r#"
        INSERT INTO requests (user_id, room_id, request_type, title, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(input.room_id)
    .bind(input.request_type)
    .bind(&input.title)
    .bind(&input.description)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(request) => {
            tracing::info!(
                "User {} raised {:?} request '{}'",
                user.email,
                request.request_type,
                request.title
            );
            (StatusCode::CREATED, Json(ApiResponse::success(request)))
        }
        Err(e) => {
            tracing::error!("Failed to create request: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create request")),
            )
        }
    }
}

/// Move a request through its lifecycle (staff). Invalid transitions
/// are rejected without touching the record.
pub async fn update_request_status(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRequestStatusRequest>,
) -> impl IntoResponse {
    let existing = sqlx::query_as::<_, MaintenanceRequest>("SELECT * FROM requests WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    let existing = match existing {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<MaintenanceRequest>::error("Request not found")),
            );
        }
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    if !existing.status.can_transition(input.status) {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::error(format!(
                "Cannot move request from {:?} to {:?}",
                existing.status, input.status
            ))),
        );
    }

    // The status gate in the WHERE clause keeps a concurrent transition
    // from being applied twice
    let result = sqlx::query_as::<_, MaintenanceRequest>(
        r#"
        UPDATE requests
        SET status = $1
        WHERE id = $2 AND status = $3
        RETURNING *
        "#,
    )
    .bind(input.status)
    .bind(id)
    .bind(existing.status)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(request)) => {
            tracing::info!(
                "Staff {} moved request {} to {:?}",
                staff.email,
                id,
                request.status
            );
            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Ok(None) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Request was updated concurrently")),
        ),
        Err(e) => {
            tracing::error!("Failed to update request: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update request")),
            )
        }
    }
}
