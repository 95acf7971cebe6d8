//! Authentication and registration handlers

use crate::models::*;
use crate::validation::{validate_password, validate_registration};
use argon2::{
    password_hash::{rand_core::OsRng as PasswordOsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "dorm_session";

/// Rate limit: max login attempts per IP per hour
const MAX_LOGIN_ATTEMPTS: i64 = 10;

/// Rate limit: max registrations per IP per hour
const MAX_REGISTER_ATTEMPTS: i64 = 5;

// =============================================================================
// Registration
// =============================================================================

/// Student self-registration
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RegisterRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers, &state.trusted_proxies);

    if !check_rate_limit(&state.pool, &client_ip, "register", MAX_REGISTER_ATTEMPTS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<UserResponse>::error(
                "Too many registration attempts. Please try again later.",
            )),
        );
    }
    record_attempt(&state.pool, &client_ip, "register").await;

    // All field-level rules first; nothing is written on failure
    let today = Utc::now().date_naive();
    if let Err(e) = validate_registration(
        &input,
        &state.allowed_email_domains,
        state.max_image_size,
        today,
    ) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    // Email and student id must be unused
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

    let student_id_taken: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE student_id = $1)")
            .bind(&input.student_id)
            .fetch_one(&state.pool)
            .await
            .unwrap_or(false);
    if student_id_taken {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Student id is already registered")),
        );
    }

    let password_hash = match hash_password(&input.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Registration failed")),
            );
        }
    };

    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            email, password_hash, full_name, phone_number, role,
            student_id, class_name, faculty, major, course, academic_status,
            date_of_birth, gender, id_card, id_card_front_image, id_card_back_image,
            avatar, place_of_origin, current_address,
            emergency_contact_name, emergency_contact_phone, emergency_contact_relation
        )
        VALUES (
            $1, $2, $3, $4, 'student',
            $5, $6, $7, $8, $9, 'studying',
            $10, $11, $12, $13, $14,
            $15, $16, $17,
            $18, $19, $20
        )
        RETURNING *
        "#,
    )
    .bind(&input.email)
    .bind(&password_hash)
    .bind(&input.full_name)
    .bind(&input.phone_number)
    .bind(&input.student_id)
    .bind(&input.class_name)
    .bind(&input.faculty)
    .bind(&input.major)
    .bind(&input.course)
    .bind(input.date_of_birth)
    .bind(input.gender)
    .bind(&input.id_card)
    .bind(&input.id_card_front_image)
    .bind(&input.id_card_back_image)
    .bind(&input.avatar_image)
    .bind(&input.place_of_origin)
    .bind(&input.current_address)
    .bind(&input.emergency_contact_name)
    .bind(&input.emergency_contact_phone)
    .bind(&input.emergency_contact_relation)
    .fetch_one(&state.pool)
    .await;

    match result {
        Ok(user) => {
            tracing::info!("Registered new student account {}", user.email);
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(UserResponse::from(user))),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Registration failed")),
            )
        }
    }
}

// =============================================================================
// Login / logout
// =============================================================================

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> impl IntoResponse {
    let client_ip = get_client_ip(&headers, &state.trusted_proxies);

    if !check_rate_limit(&state.pool, &client_ip, "login", MAX_LOGIN_ATTEMPTS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::<UserResponse>::error(
                "Too many login attempts. Please try again later.",
            )),
        );
    }
    record_attempt(&state.pool, &client_ip, "login").await;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&input.email)
        .fetch_optional(&state.pool)
        .await;

    let user = match user {
        Ok(Some(u)) => u,
        Ok(None) | Err(_) => {
            // Don't reveal whether the email exists
            return (
                StatusCode::UNAUTHORIZED,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Invalid email or password")),
            );
        }
    };

    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(h) => h,
        Err(_) => {
            tracing::error!("Invalid password hash in database for user {}", user.email);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SET_COOKIE, "".to_string())],
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::error("Invalid email or password")),
        );
    }

    // Generate session token; only its hash is stored
    let token = generate_session_token();
    let token_hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::hours(state.session_expiry_hours as i64);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(500).collect::<String>());

    let session_result = sqlx::query(
        r#"
        INSERT INTO sessions (user_id, token_hash, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user.id)
    .bind(&token_hash)
    .bind(expires_at)
    .bind(&client_ip)
    .bind(&user_agent)
    .execute(&state.pool)
    .await;

    if session_result.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::SET_COOKIE, "".to_string())],
            Json(ApiResponse::error("Failed to create session")),
        );
    }

    tracing::info!("User {} logged in ({:?})", user.email, user.role);

    let secure_flag = if state.is_production { "; Secure" } else { "" };
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        state.session_expiry_hours * 3600,
        secure_flag
    );

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(UserResponse::from(user))),
    )
}

/// Log out and delete the server-side session
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_token(&token);

        let _ = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(&token_hash)
            .execute(&state.pool)
            .await;
    }

    let secure_flag = if state.is_production { "; Secure" } else { "" };
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0{}",
        SESSION_COOKIE, secure_flag
    );

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(())),
    )
}

/// Get the currently logged-in user
pub async fn get_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match validate_session(&state.pool, &headers).await {
        Some(user) => (
            StatusCode::OK,
            Json(ApiResponse::success(UserResponse::from(user))),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Not authenticated")),
        ),
    }
}

// =============================================================================
// Password change
// =============================================================================

/// Change the current user's password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(h) => h,
        Err(_) => {
            tracing::error!("Invalid password hash in database for user {}", user.email);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Authentication error")),
            );
        }
    };

    if Argon2::default()
        .verify_password(input.current_password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Current password is incorrect")),
        );
    }

    if let Err(e) = validate_password(&input.new_password, &input.confirm_password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    let new_hash = match hash_password(&input.new_password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update password")),
            );
        }
    };

    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_hash)
        .bind(user.id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(_) => {
            tracing::info!("User {} changed their password", user.email);
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Err(e) => {
            tracing::error!("Failed to update password: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update password")),
            )
        }
    }
}

// =============================================================================
// Session Validation
// =============================================================================

/// Validate the session cookie and return the logged-in user
pub async fn validate_session(pool: &PgPool, headers: &HeaderMap) -> Option<User> {
    let token = extract_session_token(headers)?;
    let token_hash = hash_token(&token);

    let session = sqlx::query_as::<_, Session>(
        r#"
        SELECT * FROM sessions
        WHERE token_hash = $1 AND expires_at > NOW()
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .ok()??;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(session.user_id)
        .fetch_optional(pool)
        .await
        .ok()?
}

/// Delete expired sessions; called from the periodic sweep task
pub async fn cleanup_expired_sessions(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Password Utilities
// =============================================================================

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut PasswordOsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Create the initial admin account from ADMIN_EMAIL/ADMIN_PASSWORD,
/// if configured and not already present (startup utility)
pub async fn ensure_admin_user(pool: &PgPool) -> Result<(), sqlx::Error> {
    let (email, password) = match (
        std::env::var("ADMIN_EMAIL").ok(),
        std::env::var("ADMIN_PASSWORD").ok(),
    ) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e, p),
        _ => return Ok(()),
    };

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if exists {
        return Ok(());
    }

    let password_hash =
        hash_password(&password).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, full_name, phone_number, role)
        VALUES ($1, $2, 'Administrator', '0000000000', 'admin')
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .execute(pool)
    .await?;

    tracing::info!("Created initial admin account {}", email);
    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
            return Some(value.to_string());
        }
    }

    None
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn get_client_ip(headers: &HeaderMap, trusted_proxies: &[String]) -> String {
    // Forwarding headers are only honored from configured proxy ranges
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let ip = first_ip.trim();
                if trusted_proxies.is_empty()
                    || trusted_proxies.iter().any(|p| ip.starts_with(p.as_str()))
                {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.to_string();
        }
    }

    "unknown".to_string()
}

pub async fn check_rate_limit(pool: &PgPool, ip: &str, endpoint: &str, max: i64) -> bool {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM rate_limit_attempts
        WHERE ip_address = $1 AND endpoint = $2
        AND attempted_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(ip)
    .bind(endpoint)
    .fetch_one(pool)
    .await
    .unwrap_or(0);

    count < max
}

pub async fn record_attempt(pool: &PgPool, ip: &str, endpoint: &str) {
    let _ = sqlx::query("INSERT INTO rate_limit_attempts (ip_address, endpoint) VALUES ($1, $2)")
        .bind(ip)
        .bind(endpoint)
        .execute(pool)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_sha256() {
        let hash = hash_token("test-session-token");
        // SHA-256 produces a 64-character hex string
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        assert_eq!(hash_token("same-token"), hash_token("same-token"));
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn test_generate_session_token_length() {
        let token = generate_session_token();
        // 32 random bytes = 64 hex chars
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_session_token_unique() {
        assert_ne!(generate_session_token(), generate_session_token());
    }

    #[test]
    fn test_extract_session_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "dorm_session=abc123xyz; other=xyz".parse().unwrap(),
        );
        assert_eq!(
            extract_session_token(&headers),
            Some("abc123xyz".to_string())
        );
    }

    #[test]
    fn test_extract_session_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_extract_session_token_wrong_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "another_cookie=abc123".parse().unwrap());
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.7, 192.168.1.1".parse().unwrap());
        assert_eq!(get_client_ip(&headers, &[]), "10.0.0.7");
    }

    #[test]
    fn test_client_ip_ignores_untrusted_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        let trusted = vec!["10.0.0.".to_string()];
        assert_eq!(get_client_ip(&headers, &trusted), "unknown");
    }

    #[test]
    fn test_client_ip_unknown_without_headers() {
        let headers = HeaderMap::new();
        assert_eq!(get_client_ip(&headers, &[]), "unknown");
    }
}
