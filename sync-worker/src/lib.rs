//! UserSync - verified identity-provider webhooks into the users table.
//!
//! The `usersync-web` binary receives user lifecycle webhooks, checks their
//! signatures, and inserts or updates the matching user row.
//!
//! ## Architecture
//!
//! ```text
//! Request → WebhookEnvelope → Verifier → parse → Reconciler → UserStore
//! ```

pub mod config;
pub mod error;
pub mod store;
pub mod sync;
pub mod web;
pub mod webhook;

// Re-export commonly used types
pub use config::{Config, RecordProfile, StoreBackend};
pub use error::WebhookError;
pub use store::{MemoryStore, PostgrestStore, StoreError, UserStore};
pub use sync::{ReconcileOutcome, Reconciler, UserRecord};
pub use web::AppState;
pub use webhook::{VerifiedEvent, Verifier, WebhookEnvelope};
