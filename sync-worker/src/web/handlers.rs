//! Webhook endpoint handlers.
//!
//! Each delivery is handled independently:
//! 1. Extract the envelope (headers + raw body)
//! 2. Verify the signature over the canonical bytes
//! 3. Decode the event
//! 4. Reconcile it against the user store
//!
//! The first failing step decides the response.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::WebhookError;
use crate::store::UserStore;
use crate::sync::{ReconcileOutcome, Reconciler};
use crate::webhook::{self, Verifier, WebhookEnvelope};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    verifier: Arc<Result<Verifier, String>>,
    reconciler: Reconciler,
}

impl AppState {
    /// Build state around an already constructed store.
    ///
    /// A bad signing secret does not fail construction; every delivery is
    /// answered with a configuration error instead.
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Self {
        let verifier = Verifier::from_config(&config).map_err(|e| e.to_string());
        let reconciler = Reconciler::new(store, config.record_profile);
        Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            reconciler,
        }
    }

    fn verifier(&self) -> Result<&Verifier, WebhookError> {
        self.verifier
            .as_ref()
            .as_ref()
            .map_err(|reason| WebhookError::Configuration(reason.clone()))
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// User Webhook
// =============================================================================

/// Body of every accepted delivery.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

/// User sync webhook endpoint.
pub async fn user_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AckResponse>, WebhookError> {
    info!(
        body_length = body.len(),
        has_signature = headers.contains_key(webhook::SIGNATURE_HEADER),
        "webhook_received"
    );

    match process_delivery(&state, &headers, body).await {
        Ok(outcome) => {
            info!(outcome = outcome.as_str(), "webhook_accepted");
            Ok(Json(AckResponse { ok: true }))
        }
        Err(e) => {
            match &e {
                WebhookError::Configuration(_) | WebhookError::Storage(_) => {
                    error!(kind = e.kind(), error = %e, "webhook_rejected")
                }
                _ => warn!(kind = e.kind(), error = %e, "webhook_rejected"),
            }
            Err(e)
        }
    }
}

async fn process_delivery(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ReconcileOutcome, WebhookError> {
    let envelope = WebhookEnvelope::from_parts(headers, body)?;

    state.verifier()?.verify_envelope(&envelope)?;
    info!(webhook_id = %envelope.id, "signature_verified");

    let event = webhook::parse(&envelope.raw_body)?;

    Ok(state.reconciler.reconcile(&event).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::web::router;
    use crate::webhook::{canonicalize, SigningKey, ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const CREATED: &str = r#"{"type":"user.created","data":{"id":"u1","first_name":"A","last_name":"B","email_addresses":[{"email_address":"a@b.com"}]}}"#;

    fn app(store: &MemoryStore) -> Router {
        router(AppState::new(
            Config::for_memory_store(SECRET),
            Arc::new(store.clone()),
        ))
    }

    fn sign(id: &str, ts: &str, body: &str) -> String {
        let key = SigningKey::from_secret(Some(SECRET)).unwrap();
        format!("v1,{}", key.expected_signature(&canonicalize(id, ts, body.as_bytes())))
    }

    fn delivery(id: Option<&str>, ts: Option<&str>, sig: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/webhooks/clerk");
        if let Some(v) = id {
            builder = builder.header(ID_HEADER, v);
        }
        if let Some(v) = ts {
            builder = builder.header(TIMESTAMP_HEADER, v);
        }
        if let Some(v) = sig {
            builder = builder.header(SIGNATURE_HEADER, v);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn signed_delivery(body: &str) -> Request<Body> {
        let sig = sign("msg_1", "1700000000", body);
        delivery(Some("msg_1"), Some("1700000000"), Some(&sig), body)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_created_user_is_stored() {
        let store = MemoryStore::new();

        let (status, body) = send(app(&store), signed_delivery(CREATED)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"ok":true}"#);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("u1").await.unwrap().email, "a@b.com");
    }

    #[tokio::test]
    async fn test_ack_is_json() {
        let store = MemoryStore::new();
        let response = app(&store).oneshot(signed_delivery(CREATED)).await.unwrap();
        assert_eq!(
            response.headers().get("content-type").unwrap().to_str().unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_replayed_delivery_keeps_one_row() {
        let store = MemoryStore::new();

        let (first, _) = send(app(&store), signed_delivery(CREATED)).await;
        let original = store.get("u1").await.unwrap();
        let (second, _) = send(app(&store), signed_delivery(CREATED)).await;
        let replayed = store.get("u1").await.unwrap();

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(store.len().await, 1);
        assert_eq!(replayed.created_at, original.created_at);
        assert!(replayed.updated_at > original.updated_at);
    }

    #[tokio::test]
    async fn test_altered_signature_rejected() {
        let store = MemoryStore::new();
        let mut sig = sign("msg_1", "1700000000", CREATED);
        let flipped = if sig.as_bytes()[10] == b'A' { "B" } else { "A" };
        sig.replace_range(10..11, flipped);

        let request = delivery(Some("msg_1"), Some("1700000000"), Some(&sig), CREATED);
        let (status, body) = send(app(&store), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.contains("a@b.com"));
        assert!(store.is_empty().await);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_missing_timestamp_rejected_before_store() {
        let store = MemoryStore::new();
        let sig = sign("msg_1", "1700000000", CREATED);

        let request = delivery(Some("msg_1"), None, Some(&sig), CREATED);
        let (status, body) = send(app(&store), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing required headers");
        assert_eq!((store.reads(), store.writes()), (0, 0));
    }

    #[tokio::test]
    async fn test_other_event_type_is_noop() {
        let store = MemoryStore::new();
        let body = CREATED.replace("user.created", "user.deleted");

        let (status, response) = send(app(&store), signed_delivery(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, r#"{"ok":true}"#);
        assert!(store.is_empty().await);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_updated_event_changes_email() {
        let store = MemoryStore::new();
        send(app(&store), signed_delivery(CREATED)).await;

        let body = CREATED
            .replace("user.created", "user.updated")
            .replace("a@b.com", "new@b.com");
        let (status, _) = send(app(&store), signed_delivery(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.get("u1").await.unwrap().email, "new@b.com");
    }

    #[tokio::test]
    async fn test_malformed_verified_body_is_500() {
        let store = MemoryStore::new();
        let body = r#"{"type":"user.created","data":{"id":"u1"}}"#;

        let (status, _) = send(app(&store), signed_delivery(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let store = MemoryStore::new();
        store.fail_lookups(true);

        let (status, body) = send(app(&store), signed_delivery(CREATED)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error fetching user data");
    }

    #[tokio::test]
    async fn test_misconfigured_secret_is_500() {
        let store = MemoryStore::new();
        let app = router(AppState::new(
            Config::for_memory_store("no-separator-here"),
            Arc::new(store.clone()),
        ));

        let (status, _) = send(app, signed_delivery(CREATED)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let store = MemoryStore::new();
        let request = Request::builder()
            .method("GET")
            .uri("/webhooks/clerk")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(app(&store), request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health() {
        let store = MemoryStore::new();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app(&store), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }
}
