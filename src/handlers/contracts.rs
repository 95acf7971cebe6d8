//! Contract handlers: listing, direct staff creation, deletion

use crate::handlers::applications::first_rent_due_date;
use crate::models::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::AppState;

/// Contract plus the records derived at creation time
#[derive(Debug, Serialize)]
pub struct ContractCreatedResponse {
    pub contract: Contract,
    pub invoice: Invoice,
    pub room: Room,
}

// =============================================================================
// Contract Endpoints
// =============================================================================

/// List contracts: students see their own, staff see all
pub async fn list_contracts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> impl IntoResponse {
    let contracts: Vec<Contract> = if user.role.is_staff() {
        sqlx::query_as("SELECT * FROM contracts ORDER BY created_at DESC")
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    } else {
        sqlx::query_as("SELECT * FROM contracts WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.id)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };

    (StatusCode::OK, Json(ApiResponse::success(contracts)))
}

/// Create a contract directly (staff), without a prior application.
///
/// Staff supply the tenant, room, dates, and rent; the first rent
/// invoice and the room occupancy update are derived exactly as in the
/// application approval, in one transaction.
pub async fn create_contract(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Json(input): Json<CreateContract>,
) -> impl IntoResponse {
    if input.end_date <= input.start_date {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<ContractCreatedResponse>::error(
                "End date must be after start date",
            )),
        );
    }
    if input.monthly_rent <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Monthly rent must be positive")),
        );
    }

    // The tenant must be a student
    let tenant = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(input.user_id)
        .fetch_optional(&state.pool)
        .await;

    match tenant {
        Ok(Some(u)) if u.role == UserRole::Student => {}
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("Contracts can only be created for students")),
            );
        }
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Student not found")),
            );
        }
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1 FOR UPDATE")
        .bind(input.room_id)
        .fetch_optional(&mut *tx)
        .await;

    let room = match room {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Room not found")),
            );
        }
        Err(e) => {
            tracing::error!("Failed to load room: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create contract")),
            );
        }
    };

    if room.status != RoomStatus::Available {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Room is not available")),
        );
    }

    let contract = sqlx::query_as::<_, Contract>(
        r#"
        INSERT INTO contracts (user_id, room_id, start_date, end_date, status, monthly_rent)
        VALUES ($1, $2, $3, $4, 'active', $5)
        RETURNING *
        "#,
    )
    .bind(input.user_id)
    .bind(input.room_id)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.monthly_rent)
    .fetch_one(&mut *tx)
    .await;

    let contract = match contract {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to create contract: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create contract")),
            );
        }
    };

    let today = Utc::now().date_naive();
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (user_id, contract_id, amount, due_date, status, invoice_type)
        VALUES ($1, $2, $3, $4, 'pending', 'room_rent')
        RETURNING *
        "#,
    )
    .bind(input.user_id)
    .bind(contract.id)
    .bind(input.monthly_rent)
    .bind(first_rent_due_date(today))
    .fetch_one(&mut *tx)
    .await;

    let invoice = match invoice {
        Ok(i) => i,
        Err(e) => {
            tracing::error!("Failed to create first invoice: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create contract")),
            );
        }
    };

    let new_occupancy = room.current_occupancy + 1;
    let new_status = RoomStatus::from_occupancy(new_occupancy, room.capacity);

    let room = sqlx::query_as::<_, Room>(
        r#"
        UPDATE rooms
        SET current_occupancy = $1, status = $2
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(new_occupancy)
    .bind(new_status)
    .bind(room.id)
    .fetch_one(&mut *tx)
    .await;

    let room = match room {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to update room occupancy: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create contract")),
            );
        }
    };

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit contract creation: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to create contract")),
        );
    }

    tracing::info!(
        "Staff {} created contract {} for room {} (rent {}/month)",
        staff.email,
        contract.id,
        room.room_number,
        contract.monthly_rent
    );

    (
        StatusCode::CREATED,
        Json(ApiResponse::success(ContractCreatedResponse {
            contract,
            invoice,
            room,
        })),
    )
}

/// Delete a contract (staff); its invoices go with it by cascade
pub async fn delete_contract(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Contract>("DELETE FROM contracts WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    match result {
        Ok(Some(contract)) => {
            tracing::info!(
                "Staff {} deleted contract {} (user {})",
                staff.email,
                id,
                contract.user_id
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
            Json(ApiResponse::error("Contract not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete contract: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete contract")),
            )
        }
    }
}

// =============================================================================
// Maintenance Functions
// =============================================================================

/// Mark active contracts past their end date as expired
///
/// Called periodically from the sweep task in main.rs; the expired state
/// exists in the data model but is only ever produced here.
pub async fn expire_contracts(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE contracts
        SET status = 'expired'
        WHERE status = 'active' AND end_date < CURRENT_DATE
        "#,
    )
    .execute(pool)
    .await?;

    let count = result.rows_affected();
    if count > 0 {
        tracing::info!("Marked {} contracts as expired", count);
    }
    Ok(count)
}
