//! Webhook verification and decoding.
//!
//! ```text
//! headers + raw body → WebhookEnvelope → canonicalize → verify → parse → VerifiedEvent
//! ```

pub mod envelope;
pub mod event;
pub mod signature;

pub use envelope::{WebhookEnvelope, ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use event::{parse, EventKind, UserData, VerifiedEvent};
pub use signature::{canonicalize, constant_time_compare, verify, SigningKey, Verifier};
