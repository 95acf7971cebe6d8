//! Room management handlers

use crate::models::*;
use crate::validation::validate_create_room;
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
pub struct ListRoomsQuery {
    pub status: Option<RoomStatus>,
}

// =============================================================================
// Room Endpoints
// =============================================================================

/// List rooms, optionally filtered by status
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<ListRoomsQuery>,
) -> impl IntoResponse {
    let rooms: Vec<Room> = if let Some(status) = query.status {
        sqlx::query_as("SELECT * FROM rooms WHERE status = $1 ORDER BY building, room_number")
            .bind(status)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    } else {
        sqlx::query_as("SELECT * FROM rooms ORDER BY building, room_number")
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };

    (StatusCode::OK, Json(ApiResponse::success(rooms)))
}

/// Create a room (staff); new rooms start empty and available
pub async fn create_room(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Json(input): Json<CreateRoom>,
) -> impl IntoResponse {
    if let Err(e) = validate_create_room(&input) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Room>::error(e.to_string())),
        );
    }

    let result = sqlx::query_as::<_, Room>(
        r#"
        INSERT INTO rooms (room_number, building, floor, room_type, capacity, price_per_semester, amenities)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&input.room_number)
    .bind(&input.building)
    .bind(input.floor)
    .bind(input.room_type)
    .bind(input.capacity)
    .bind(input.price_per_semester)
    .bind(&input.amenities)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(room) => {
            tracing::info!(
                "Staff {} created room {} in building {}",
                staff.email,
                room.room_number,
                room.building
            );
            (StatusCode::CREATED, Json(ApiResponse::success(room)))
        }
        Err(e) => {
            if is_unique_violation(&e) {
                return (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(
                        "A room with this number already exists in this building",
                    )),
                );
            }
            tracing::error!("Failed to create room: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create room")),
            )
        }
    }
}

/// Update a room (staff).
///
/// Unless the room is in maintenance (a manual override), the status is
/// re-derived from occupancy vs capacity so the occupied/available
/// invariant holds after every change.
pub async fn update_room(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRoom>,
) -> impl IntoResponse {
    let existing = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    let existing = match existing {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<Room>::error("Room not found")),
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

    let room_number = input.room_number.unwrap_or(existing.room_number);
    let building = input.building.unwrap_or(existing.building);
    let floor = input.floor.unwrap_or(existing.floor);
    let room_type = input.room_type.unwrap_or(existing.room_type);
    let capacity = input.capacity.unwrap_or(existing.capacity);
    let price_per_semester = input.price_per_semester.unwrap_or(existing.price_per_semester);
    let amenities = input.amenities.unwrap_or(existing.amenities);

    if capacity < 1 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Room capacity must be at least 1")),
        );
    }
    if price_per_semester <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Price must be positive")),
        );
    }

    let status = match input.status.unwrap_or(existing.status) {
        RoomStatus::Maintenance => RoomStatus::Maintenance,
        _ => RoomStatus::from_occupancy(existing.current_occupancy, capacity),
    };

    let result = sqlx::query_as::<_, Room>(
        r#"
        UPDATE rooms
        SET room_number = $1, building = $2, floor = $3, room_type = $4,
            capacity = $5, price_per_semester = $6, amenities = $7, status = $8
        WHERE id = $9
        RETURNING *
        "#,
    )
    .bind(&room_number)
    .bind(&building)
    .bind(floor)
    .bind(room_type)
    .bind(capacity)
    .bind(price_per_semester)
    .bind(&amenities)
    .bind(status)
    .bind(id)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(room) => {
            tracing::info!("Staff {} updated room {}", staff.email, room.room_number);
            (StatusCode::OK, Json(ApiResponse::success(room)))
        }
        Err(e) => {
            if is_unique_violation(&e) {
                return (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(
                        "A room with this number already exists in this building",
                    )),
                );
            }
            tracing::error!("Failed to update room: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update room")),
            )
        }
    }
}

/// Delete a room (staff); refused while applications, contracts, or
/// requests still reference it
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Room>("DELETE FROM rooms WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    match result {
        Ok(Some(room)) => {
            tracing::info!(
                "Staff {} deleted room {} in building {}",
                staff.email,
                room.room_number,
                room.building
            );
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "deleted": true,
                    "id": id
                }))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Room not found")),
        ),
        Err(e) => {
            if is_foreign_key_violation(&e) {
                return (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(
                        "Room is still referenced by applications, contracts, or requests",
                    )),
                );
            }
            tracing::error!("Failed to delete room: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete room")),
            )
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}
