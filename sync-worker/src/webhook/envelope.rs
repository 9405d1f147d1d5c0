//! Extraction of the delivery envelope from request headers.

use axum::{body::Bytes, http::HeaderMap};
use tracing::warn;

use crate::error::WebhookError;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

/// One delivery as received, before any verification.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    /// Delivery identifier
    pub id: String,
    /// Delivery time exactly as sent, used for canonicalization
    pub timestamp: String,
    /// Candidate signatures, each `<version>,<base64>`
    pub signatures: Vec<String>,
    /// Unparsed request body
    pub raw_body: Bytes,
}

impl WebhookEnvelope {
    /// Build an envelope, failing with `MissingHeaders` if any part is absent or empty.
    pub fn from_parts(headers: &HeaderMap, raw_body: Bytes) -> Result<Self, WebhookError> {
        let id = header_value(headers, ID_HEADER);
        let timestamp = header_value(headers, TIMESTAMP_HEADER);
        let signatures: Vec<String> = header_value(headers, SIGNATURE_HEADER)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        match (id, timestamp) {
            (Some(id), Some(timestamp)) if !signatures.is_empty() && !raw_body.is_empty() => {
                Ok(Self {
                    id,
                    timestamp,
                    signatures,
                    raw_body,
                })
            }
            (id, timestamp) => {
                warn!(
                    has_id = id.is_some(),
                    has_timestamp = timestamp.is_some(),
                    has_signature = !signatures.is_empty(),
                    has_body = !raw_body.is_empty(),
                    "webhook_missing_headers"
                );
                Err(WebhookError::MissingHeaders)
            }
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(id: Option<&str>, ts: Option<&str>, sig: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = id {
            map.insert(ID_HEADER, HeaderValue::from_str(v).unwrap());
        }
        if let Some(v) = ts {
            map.insert(TIMESTAMP_HEADER, HeaderValue::from_str(v).unwrap());
        }
        if let Some(v) = sig {
            map.insert(SIGNATURE_HEADER, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_complete_envelope() {
        let map = headers(Some("msg_1"), Some("1700000000"), Some("v1,abc v1,def"));
        let envelope = WebhookEnvelope::from_parts(&map, Bytes::from_static(b"{}")).unwrap();

        assert_eq!(envelope.id, "msg_1");
        assert_eq!(envelope.timestamp, "1700000000");
        assert_eq!(envelope.signatures, vec!["v1,abc", "v1,def"]);
        assert_eq!(&envelope.raw_body[..], b"{}");
    }

    #[test]
    fn test_each_missing_header_rejects() {
        let body = Bytes::from_static(b"{}");
        let cases = [
            headers(None, Some("1"), Some("v1,a")),
            headers(Some("msg_1"), None, Some("v1,a")),
            headers(Some("msg_1"), Some("1"), None),
        ];
        for map in cases {
            assert!(matches!(
                WebhookEnvelope::from_parts(&map, body.clone()),
                Err(WebhookError::MissingHeaders)
            ));
        }
    }

    #[test]
    fn test_blank_header_counts_as_missing() {
        let map = headers(Some("msg_1"), Some("  "), Some("v1,a"));
        assert!(matches!(
            WebhookEnvelope::from_parts(&map, Bytes::from_static(b"{}")),
            Err(WebhookError::MissingHeaders)
        ));
    }

    #[test]
    fn test_empty_body_rejects() {
        let map = headers(Some("msg_1"), Some("1"), Some("v1,a"));
        assert!(matches!(
            WebhookEnvelope::from_parts(&map, Bytes::new()),
            Err(WebhookError::MissingHeaders)
        ));
    }
}
