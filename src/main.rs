//! Dormitory Management Portal
//!
//! A web application for student housing: students apply for rooms and
//! raise maintenance requests, staff approve applications into contracts
//! with auto-generated rent invoices.
//!
//! ## Features
//!
//! - **Student portal**: registration, room applications, invoices, requests
//! - **Staff portal**: room management, application approval, contracts, billing
//! - **Derivation workflow**: approving an application creates the contract,
//!   its first rent invoice, and the room occupancy update in one transaction

mod config;
mod db;
mod handlers;
mod models;
mod validation;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use handlers::AppState;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dorm_portal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Dormitory Management Portal");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Bootstrap the initial admin account if configured
    handlers::ensure_admin_user(&pool).await?;

    // Create application state
    let state = AppState {
        pool: pool.clone(),
        session_expiry_hours: config.session_expiry_hours,
        max_image_size: config.max_image_size,
        allowed_email_domains: config.allowed_email_domains.clone(),
        is_production: config.is_production(),
        trusted_proxies: config.trusted_proxies.clone(),
    };

    // Periodic sweep: expired sessions, overdue invoices, expired contracts
    let sweep_pool = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = handlers::cleanup_expired_sessions(&sweep_pool).await {
                tracing::warn!("Session cleanup failed: {}", e);
            }
            if let Err(e) = handlers::mark_overdue_invoices(&sweep_pool).await {
                tracing::warn!("Overdue invoice sweep failed: {}", e);
            }
            if let Err(e) = handlers::expire_contracts(&sweep_pool).await {
                tracing::warn!("Contract expiry sweep failed: {}", e);
            }
        }
    });
    tracing::info!("Background sweep task started");

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(true)
    } else {
        CorsLayer::permissive()
    };

    // Public endpoints; logout and me validate the session themselves
    let public_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user));

    // Endpoints for any logged-in user
    let user_routes = Router::new()
        .route("/auth/password", put(handlers::change_password))
        .route("/profile", put(handlers::update_profile))
        .route("/rooms", get(handlers::list_rooms))
        .route(
            "/applications",
            get(handlers::list_applications).post(handlers::create_application),
        )
        .route("/contracts", get(handlers::list_contracts))
        .route("/invoices", get(handlers::list_invoices))
        .route("/invoices/:id/pay", post(handlers::pay_invoice))
        .route(
            "/requests",
            get(handlers::list_requests).post(handlers::create_request),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_auth,
        ));

    // Staff portal (managers and admins)
    let staff_routes = Router::new()
        .route("/rooms", post(handlers::create_room))
        .route(
            "/rooms/:id",
            put(handlers::update_room).delete(handlers::delete_room),
        )
        .route(
            "/applications/:id/approve",
            post(handlers::approve_application),
        )
        .route(
            "/applications/:id/reject",
            post(handlers::reject_application),
        )
        .route("/contracts", post(handlers::create_contract))
        .route("/contracts/:id", delete(handlers::delete_contract))
        .route("/invoices", post(handlers::create_invoice))
        .route("/requests/:id/status", put(handlers::update_request_status))
        .route("/dashboard", get(handlers::get_dashboard_stats))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_staff,
        ));

    // Admin-only account management
    let admin_routes = Router::new()
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_admin,
        ));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .nest("/admin", staff_routes.merge(admin_routes));

    // Body limit covers the three base64 image payloads at registration
    let app = Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_image_size * 4))
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::security_headers,
        ))
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
