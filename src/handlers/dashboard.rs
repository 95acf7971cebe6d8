//! Staff dashboard statistics

use crate::models::*;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};

use super::AppState;

/// Aggregate counters for the staff dashboard
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    Extension(_staff): Extension<User>,
) -> impl IntoResponse {
    let total_students: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'student'")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

    let total_rooms: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms")
        .fetch_one(&state.pool)
        .await
        .unwrap_or(0);

    let room_counts = sqlx::query_as::<_, (RoomStatus, i64)>(
        "SELECT status, COUNT(*) FROM rooms GROUP BY status",
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let mut available_rooms = 0;
    let mut occupied_rooms = 0;
    let mut maintenance_rooms = 0;
    for (status, count) in room_counts {
        match status {
            RoomStatus::Available => available_rooms = count,
            RoomStatus::Occupied => occupied_rooms = count,
            RoomStatus::Maintenance => maintenance_rooms = count,
        }
    }

    let pending_applications: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE status = 'pending'")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

    let pending_requests: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM requests WHERE status = 'pending'")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

    let overdue_invoices: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE status = 'overdue'")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

    let collected_revenue: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM invoices WHERE status = 'paid'",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap_or(0);

    (
        StatusCode::OK,
        Json(ApiResponse::success(DashboardStats {
            total_students,
            total_rooms,
            available_rooms,
            occupied_rooms,
            maintenance_rooms,
            pending_applications,
            pending_requests,
            overdue_invoices,
            collected_revenue,
        })),
    )
}
