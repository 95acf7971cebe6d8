//! User management and profile handlers

use crate::handlers::auth::hash_password;
use crate::models::*;
use crate::validation::{validate_student_id, MIN_PASSWORD_LEN};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<UserRole>,
}

// =============================================================================
// Admin User Endpoints
// =============================================================================

/// List accounts (admin), optionally filtered by role
pub async fn list_users(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Query(query): Query<ListUsersQuery>,
) -> impl IntoResponse {
    let users: Vec<User> = if let Some(role) = query.role {
        sqlx::query_as("SELECT * FROM users WHERE role = $1 ORDER BY created_at DESC")
            .bind(role)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    } else {
        sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };

    tracing::info!("Admin {} listed {} users", admin.email, users.len());

    let responses: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    (StatusCode::OK, Json(ApiResponse::success(responses)))
}

/// Add an account with a chosen role (admin)
pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Json(input): Json<CreateUser>,
) -> impl IntoResponse {
    if input.email.trim().is_empty() || input.full_name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<UserResponse>::error(
                "Email and full name are required",
            )),
        );
    }
    if input.password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ))),
        );
    }
    if let Some(ref student_id) = input.student_id {
        if let Err(e) = validate_student_id(student_id) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    }

    let email_taken: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(&input.email)
            .fetch_one(&state.pool)
            .await
            .unwrap_or(false);
    if email_taken {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Email is already registered")),
        );
    }

    let password_hash = match hash_password(&input.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create user")),
            );
        }
    };

    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            email, password_hash, full_name, phone_number, role,
            student_id, class_name, faculty, major, course
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(&input.email)
    .bind(&password_hash)
    .bind(&input.full_name)
    .bind(&input.phone_number)
    .bind(input.role)
    .bind(&input.student_id)
    .bind(&input.class_name)
    .bind(&input.faculty)
    .bind(&input.major)
    .bind(&input.course)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(user) => {
            tracing::info!(
                "Admin {} created {:?} account {}",
                admin.email,
                user.role,
                user.email
            );
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(UserResponse::from(user))),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create user")),
            )
        }
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Update the current user's contact and emergency details
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<UpdateProfile>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET phone_number = COALESCE($1, phone_number),
            current_address = COALESCE($2, current_address),
            avatar = COALESCE($3, avatar),
            emergency_contact_name = COALESCE($4, emergency_contact_name),
            emergency_contact_phone = COALESCE($5, emergency_contact_phone),
            emergency_contact_relation = COALESCE($6, emergency_contact_relation),
            updated_at = NOW()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(&input.phone_number)
    .bind(&input.current_address)
    .bind(&input.avatar)
    .bind(&input.emergency_contact_name)
    .bind(&input.emergency_contact_phone)
    .bind(&input.emergency_contact_relation)
    .bind(user.id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(updated)) => (
            StatusCode::OK,
            Json(ApiResponse::success(UserResponse::from(updated))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update profile")),
            )
        }
    }
}
