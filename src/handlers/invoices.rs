//! Invoice handlers: listing, payment, manual staff invoices

use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
}

// =============================================================================
// Invoice Endpoints
// =============================================================================

/// List invoices: students see their own, staff see all
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListInvoicesQuery>,
) -> impl IntoResponse {
    let invoices: Vec<Invoice> = if user.role.is_staff() {
        if let Some(status) = query.status {
            sqlx::query_as("SELECT * FROM invoices WHERE status = $1 ORDER BY due_date, created_at")
                .bind(status)
                .fetch_all(&state.pool)
                .await
                .unwrap_or_default()
        } else {
            sqlx::query_as("SELECT * FROM invoices ORDER BY due_date, created_at")
                .fetch_all(&state.pool)
                .await
                .unwrap_or_default()
        }
    } else if let Some(status) = query.status {
        sqlx::query_as(
            "SELECT * FROM invoices WHERE user_id = $1 AND status = $2 ORDER BY due_date, created_at",
        )
        .bind(user.id)
        .bind(status)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default()
    } else {
        sqlx::query_as("SELECT * FROM invoices WHERE user_id = $1 ORDER BY due_date, created_at")
            .bind(user.id)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };

    (StatusCode::OK, Json(ApiResponse::success(invoices)))
}

/// Pay an invoice. Only pending or overdue invoices can be paid, so a
/// second payment finds nothing to update and revenue is never counted
/// twice. Students can only pay their own invoices.
pub async fn pay_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = if user.role.is_staff() {
        sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = 'paid'
            WHERE id = $1 AND status IN ('pending', 'overdue')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&state.pool)
        .await
    } else {
        sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = 'paid'
            WHERE id = $1 AND user_id = $2 AND status IN ('pending', 'overdue')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user.id)
        .fetch_optional(&state.pool)
        .await
    };

    match result {
        Ok(Some(invoice)) => {
            tracing::info!(
                "Invoice {} paid by {} (amount {})",
                id,
                user.email,
                invoice.amount
            );
            (StatusCode::OK, Json(ApiResponse::success(invoice)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Invoice not found or already paid")),
        ),
        Err(e) => {
            tracing::error!("Failed to pay invoice: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to pay invoice")),
            )
        }
    }
}

/// Create a manual invoice against a contract (staff), e.g. electricity
/// or water charges
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Json(input): Json<CreateInvoice>,
) -> impl IntoResponse {
    if input.amount <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Invoice>::error("Amount must be positive")),
        );
    }

    // The invoice owner is the contract's tenant
    let contract = sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
        .bind(input.contract_id)
        .fetch_optional(&state.pool)
        .await;

    let contract = match contract {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Contract not found")),
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

    let result = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (user_id, contract_id, amount, due_date, status, invoice_type)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        RETURNING *
        "#,
    )
    .bind(contract.user_id)
    .bind(input.contract_id)
    .bind(input.amount)
    .bind(input.due_date)
    .bind(input.invoice_type)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(invoice) => {
            tracing::info!(
                "Staff {} created {:?} invoice {} for contract {} (amount {})",
                staff.email,
                invoice.invoice_type,
                invoice.id,
                invoice.contract_id,
                invoice.amount
            );
            (StatusCode::CREATED, Json(ApiResponse::success(invoice)))
        }
        Err(e) => {
            tracing::error!("Failed to create invoice: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create invoice")),
            )
        }
    }
}

// =============================================================================
// Maintenance Functions
// =============================================================================

/// Mark pending invoices past their due date as overdue
///
/// Called periodically from the sweep task in main.rs; the overdue state
/// exists in the data model but is only ever produced here.
pub async fn mark_overdue_invoices(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET status = 'overdue'
        WHERE status = 'pending' AND due_date < CURRENT_DATE
        "#,
    )
    .execute(pool)
    .await?;

    let count = result.rows_affected();
    if count > 0 {
        tracing::info!("Marked {} invoices as overdue", count);
    }
    Ok(count)
}
