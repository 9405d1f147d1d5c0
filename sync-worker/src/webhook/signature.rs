//! Svix-style webhook signature verification.
//!
//! The identity provider signs `"{svix-id}.{svix-timestamp}.{raw body}"` with
//! HMAC-SHA256 and sends one or more `v1,<base64>` signatures in the
//! `svix-signature` header.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::error::WebhookError;
use crate::webhook::WebhookEnvelope;
use crate::Config;

type HmacSha256 = Hmac<Sha256>;

/// Build the exact byte sequence the sender signed.
///
/// The body is used as received. Re-serialising parsed JSON would change
/// whitespace or key order and break verification.
pub fn canonicalize(id: &str, timestamp: &str, raw_body: &[u8]) -> Vec<u8> {
    let mut signed = Vec::with_capacity(id.len() + timestamp.len() + raw_body.len() + 2);
    signed.extend_from_slice(id.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(raw_body);
    signed
}

/// HMAC state keyed with the decoded secret.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
    key_len: usize,
}

impl SigningKey {
    /// Parse a `<prefix>_<base64 key>` secret such as `whsec_MfKQ9r8G...`.
    ///
    /// The prefix is a key identifier and is discarded.
    pub fn from_secret(secret: Option<&str>) -> Result<Self, WebhookError> {
        let secret = secret
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WebhookError::Configuration("signing secret is not set".to_string()))?;

        let (_prefix, encoded) = secret.split_once('_').ok_or_else(|| {
            WebhookError::Configuration("signing secret has no '_' separator".to_string())
        })?;

        let key = STANDARD.decode(encoded).map_err(|e| {
            WebhookError::Configuration(format!("signing secret is not valid base64: {e}"))
        })?;

        if key.is_empty() {
            return Err(WebhookError::Configuration(
                "signing secret key material is empty".to_string(),
            ));
        }

        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|_| WebhookError::Configuration("signing key rejected by HMAC".to_string()))?;

        Ok(Self {
            mac,
            key_len: key.len(),
        })
    }

    /// Raw HMAC-SHA256 of the canonical bytes.
    pub fn sign(&self, canonical: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(canonical);
        mac.finalize().into_bytes().to_vec()
    }

    /// The signature a legitimate sender would present, base64 encoded.
    pub fn expected_signature(&self, canonical: &[u8]) -> String {
        STANDARD.encode(self.sign(canonical))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_len", &self.key_len)
            .finish()
    }
}

/// Check the presented signatures against the canonical bytes.
///
/// Returns `true` if any candidate matches. Entries that do not look like
/// `<version>,<base64>` are skipped so one bad entry cannot mask a good one.
pub fn verify(key: &SigningKey, canonical: &[u8], presented: &[String]) -> bool {
    let expected = key.sign(canonical);

    presented.iter().any(|entry| match decode_presented(entry) {
        Some(candidate) => constant_time_compare(&expected, &candidate),
        None => {
            debug!(entry_length = entry.len(), "signature_entry_unparseable");
            false
        }
    })
}

/// Extract and decode the part after the version tag.
fn decode_presented(entry: &str) -> Option<Vec<u8>> {
    let (_version, encoded) = entry.split_once(',')?;
    STANDARD.decode(encoded.trim()).ok()
}

/// Constant-time byte comparison to prevent timing attacks.
///
/// Only a length difference returns early; signature length is fixed and
/// public, so that leaks nothing.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    compare_counted(a, b).0
}

/// Comparison that also reports how many byte pairs it inspected.
fn compare_counted(a: &[u8], b: &[u8]) -> (bool, usize) {
    if a.len() != b.len() {
        return (false, 0);
    }

    let mut result = 0u8;
    let mut touched = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
        touched += 1;
    }
    (std::hint::black_box(result) == 0, touched)
}

/// Reject deliveries whose timestamp is further than `max_age_seconds` from `now`.
pub fn check_timestamp(timestamp: &str, max_age_seconds: u64, now: i64) -> Result<(), WebhookError> {
    let sent: i64 = timestamp.trim().parse().map_err(|_| {
        warn!(timestamp = %timestamp, "webhook_timestamp_invalid");
        WebhookError::StaleTimestamp
    })?;

    let age = now.abs_diff(sent);
    if age > max_age_seconds {
        warn!(
            webhook_time = sent,
            current_time = now,
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "webhook_timestamp_stale"
        );
        return Err(WebhookError::StaleTimestamp);
    }

    Ok(())
}

/// Signature checks for one configured secret.
#[derive(Debug, Clone)]
pub struct Verifier {
    key: SigningKey,
    max_age_seconds: Option<u64>,
}

impl Verifier {
    pub fn new(key: SigningKey, max_age_seconds: Option<u64>) -> Self {
        Self {
            key,
            max_age_seconds,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, WebhookError> {
        let key = SigningKey::from_secret(config.signing_secret.as_deref())?;
        Ok(Self::new(key, config.signature_max_age))
    }

    /// Verify an envelope, returning `SignatureMismatch` if no candidate matches.
    pub fn verify_envelope(&self, envelope: &WebhookEnvelope) -> Result<(), WebhookError> {
        if let Some(max_age) = self.max_age_seconds {
            check_timestamp(&envelope.timestamp, max_age, chrono::Utc::now().timestamp())?;
        }

        let canonical = canonicalize(&envelope.id, &envelope.timestamp, &envelope.raw_body);
        if verify(&self.key, &canonical, &envelope.signatures) {
            Ok(())
        } else {
            warn!(
                webhook_id = %envelope.id,
                signatures_presented = envelope.signatures.len(),
                "signature_mismatch"
            );
            Err(WebhookError::SignatureMismatch)
        }
    }
}
