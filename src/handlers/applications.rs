//! Room application handlers, including the approval workflow that
//! derives a contract, the first rent invoice, and the room occupancy
//! update from an approved application.

use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;

/// Contracts run for one semester of this many months
pub const SEMESTER_MONTHS: u32 = 5;

/// Rent is due on this day of the month
pub const RENT_DUE_DAY: u32 = 5;

// =============================================================================
// Derivation arithmetic
// =============================================================================

/// Monthly rent is the semester price spread evenly over the semester
pub fn monthly_rent_from_semester_price(price_per_semester: i64) -> i64 {
    (price_per_semester as f64 / SEMESTER_MONTHS as f64).round() as i64
}

/// A contract starting today ends one semester later
pub fn contract_end_date(start_date: NaiveDate) -> NaiveDate {
    start_date
        .checked_add_months(Months::new(SEMESTER_MONTHS))
        .unwrap_or(start_date)
}

/// First rent due date: day 5 of the current month, rolled to day 5 of
/// the next month once the 5th has been reached.
pub fn first_rent_due_date(today: NaiveDate) -> NaiveDate {
    let due = today.with_day(RENT_DUE_DAY).unwrap_or(today);
    if today.day() >= RENT_DUE_DAY {
        due.checked_add_months(Months::new(1)).unwrap_or(due)
    } else {
        due
    }
}

// =============================================================================
// Query / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListApplicationsQuery {
    pub status: Option<ApplicationStatus>,
}

/// Everything the approval derived, returned in one payload
#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub application: Application,
    pub contract: Contract,
    pub invoice: Invoice,
    pub room: Room,
}

// =============================================================================
// Application Endpoints
// =============================================================================

/// List applications: students see their own, staff see all
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListApplicationsQuery>,
) -> impl IntoResponse {
    let applications: Vec<Application> = if user.role.is_staff() {
        if let Some(status) = query.status {
            sqlx::query_as(
                "SELECT * FROM applications WHERE status = $1 ORDER BY created_at DESC",
            )
            .bind(status)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
        } else {
            sqlx::query_as("SELECT * FROM applications ORDER BY created_at DESC")
                .fetch_all(&state.pool)
                .await
                .unwrap_or_default()
        }
    } else if let Some(status) = query.status {
        sqlx::query_as(
            "SELECT * FROM applications WHERE user_id = $1 AND status = $2 ORDER BY created_at DESC",
        )
        .bind(user.id)
        .bind(status)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default()
    } else {
        sqlx::query_as("SELECT * FROM applications WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.id)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };

    (StatusCode::OK, Json(ApiResponse::success(applications)))
}

/// Submit a room application (students only, always for themselves)
pub async fn create_application(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<CreateApplication>,
) -> impl IntoResponse {
    if user.role != UserRole::Student {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<Application>::error(
                "Only students can apply for rooms",
            )),
        );
    }

    if input.semester.trim().is_empty() || input.academic_year.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Semester and academic year are required")),
        );
    }

    // The requested room must exist and still take applications
    let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
        .bind(input.room_id)
        .fetch_optional(&state.pool)
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
            tracing::error!("Database error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    if room.status != RoomStatus::Available {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Room is not available")),
        );
    }

    let result = sqlx::query_as::<_, Application>(
        r#"
        INSERT INTO applications (user_id, room_id, semester, academic_year)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(input.room_id)
    .bind(&input.semester)
    .bind(&input.academic_year)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(application) => {
            tracing::info!(
                "Student {} applied for room {} ({}/{})",
                user.email,
                room.room_number,
                application.semester,
                application.academic_year
            );
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(application)),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create application: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create application")),
            )
        }
    }
}

/// Approve a pending application (staff).
///
/// Runs as one transaction: the application is claimed while still
/// pending, then a contract, its first rent invoice, and the room
/// occupancy update are derived together. If anything is missing the
/// whole approval rolls back, so an application can never end up
/// approved without its contract.
pub async fn approve_application(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<ApprovalResponse>::error("Database error")),
            );
        }
    };

    // Claim the application; a second approval finds nothing pending
    let application = sqlx::query_as::<_, Application>(
        r#"
        UPDATE applications
        SET status = 'approved'
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await;

    let application = match application {
        Ok(Some(a)) => a,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(
                    "Application not found or already processed",
                )),
            );
        }
        Err(e) => {
            tracing::error!("Failed to claim application: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to approve application")),
            );
        }
    };

    // Lock the room row; concurrent approvals serialize on the occupancy update
    let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1 FOR UPDATE")
        .bind(application.room_id)
        .fetch_optional(&mut *tx)
        .await;

    let room = match room {
        Ok(Some(r)) => r,
        Ok(None) => {
            // Roll the claim back too; the application stays pending
            let _ = tx.rollback().await;
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::error("Referenced room no longer exists")),
            );
        }
        Err(e) => {
            tracing::error!("Failed to load room: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to approve application")),
            );
        }
    };

    let monthly_rent = monthly_rent_from_semester_price(room.price_per_semester);
    let today = Utc::now().date_naive();

    let contract = sqlx::query_as::<_, Contract>(
        r#"
        INSERT INTO contracts (user_id, room_id, start_date, end_date, status, monthly_rent)
        VALUES ($1, $2, $3, $4, 'active', $5)
        RETURNING *
        "#,
    )
    .bind(application.user_id)
    .bind(application.room_id)
    .bind(today)
    .bind(contract_end_date(today))
    .bind(monthly_rent)
    .fetch_one(&mut *tx)
    .await;

    let contract = match contract {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to create contract: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to approve application")),
            );
        }
    };

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (user_id, contract_id, amount, due_date, status, invoice_type)
        VALUES ($1, $2, $3, $4, 'pending', 'room_rent')
        RETURNING *
        "#,
    )
    .bind(application.user_id)
    .bind(contract.id)
    .bind(monthly_rent)
    .bind(first_rent_due_date(today))
    .fetch_one(&mut *tx)
    .await;

    let invoice = match invoice {
        Ok(i) => i,
        Err(e) => {
            tracing::error!("Failed to create first invoice: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to approve application")),
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
                Json(ApiResponse::error("Failed to approve application")),
            );
        }
    };

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit approval: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to approve application")),
        );
    }

    tracing::info!(
        "Staff {} approved application {} (contract {}, rent {}/month)",
        staff.email,
        id,
        contract.id,
        contract.monthly_rent
    );

    (
        StatusCode::OK,
        Json(ApiResponse::success(ApprovalResponse {
            application,
            contract,
            invoice,
            room,
        })),
    )
}

/// Reject a pending application (staff); touches nothing else
pub async fn reject_application(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, Application>(
        r#"
        UPDATE applications
        SET status = 'rejected'
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(application)) => {
            tracing::info!("Staff {} rejected application {}", staff.email, id);
            (StatusCode::OK, Json(ApiResponse::success(application)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(
                "Application not found or already processed",
            )),
        ),
        Err(e) => {
            tracing::error!("Failed to reject application: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to reject application")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_rent_divides_semester_price() {
        assert_eq!(monthly_rent_from_semester_price(2_000_000), 400_000);
        assert_eq!(monthly_rent_from_semester_price(3_000_000), 600_000);
        assert_eq!(monthly_rent_from_semester_price(4_500_000), 900_000);
    }

    #[test]
    fn test_monthly_rent_rounds_to_nearest() {
        // 7/5 = 1.4 rounds down, 8/5 = 1.6 rounds up
        assert_eq!(monthly_rent_from_semester_price(7), 1);
        assert_eq!(monthly_rent_from_semester_price(8), 2);
        assert_eq!(monthly_rent_from_semester_price(2_000_003), 400_001);
    }

    #[test]
    fn test_contract_runs_one_semester() {
        assert_eq!(contract_end_date(date(2024, 9, 1)), date(2025, 2, 1));
        // Day is clamped when the target month is shorter
        assert_eq!(contract_end_date(date(2024, 9, 30)), date(2025, 2, 28));
    }

    #[test]
    fn test_due_date_before_the_fifth() {
        assert_eq!(first_rent_due_date(date(2024, 10, 1)), date(2024, 10, 5));
        assert_eq!(first_rent_due_date(date(2024, 10, 4)), date(2024, 10, 5));
    }

    #[test]
    fn test_due_date_rolls_from_the_fifth() {
        assert_eq!(first_rent_due_date(date(2024, 10, 5)), date(2024, 11, 5));
        assert_eq!(first_rent_due_date(date(2024, 10, 20)), date(2024, 11, 5));
    }

    #[test]
    fn test_due_date_rolls_across_year_end() {
        assert_eq!(first_rent_due_date(date(2024, 12, 20)), date(2025, 1, 5));
    }
}
