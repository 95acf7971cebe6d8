//! HTTP request handlers

pub mod applications;
pub mod auth;
pub mod contracts;
pub mod dashboard;
pub mod invoices;
pub mod middleware;
pub mod requests;
pub mod rooms;
pub mod users;

pub use applications::*;
pub use auth::*;
pub use contracts::*;
pub use dashboard::*;
pub use invoices::*;
pub use requests::*;
pub use rooms::*;
pub use users::*;

use sqlx::PgPool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub session_expiry_hours: u64,
    pub max_image_size: usize,
    pub allowed_email_domains: Vec<String>,
    pub is_production: bool,
    /// Trusted proxy IP prefixes for X-Forwarded-For validation
    pub trusted_proxies: Vec<String>,
}
