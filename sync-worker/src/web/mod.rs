//! Web server module for receiving identity-provider webhooks.
//!
//! Deliveries are verified and reconciled inline; the response tells the
//! sender whether to retry.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

pub use handlers::{health, user_webhook, AckResponse, AppState, HealthResponse};

/// Path the identity provider delivers user events to.
pub const WEBHOOK_PATH: &str = "/webhooks/clerk";

/// Routes without transport layers; the binary adds tracing on top.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(user_webhook))
        .with_state(state)
}
