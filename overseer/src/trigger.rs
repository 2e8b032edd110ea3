//! Trigger-side identity for incoming work
//!
//! Correlation ids are derived from the delivery's own identity so that
//! at-least-once delivery stays idempotent: re-delivering the same request
//! yields the same id and lands on the same session. Retrying a failed
//! session means sending a new request id, never reusing the old one.

use sha2::{Digest, Sha256};

/// Stable correlation id for one external work request
pub fn derive_correlation_id(source: &str, request_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    // Field separator keeps ("ab", "c") and ("a", "bc") distinct.
    hasher.update(b"\x1f");
    hasher.update(request_id.as_bytes());
    let digest = hasher.finalize();
    format!("sess-{}", hex::encode(&digest[..12]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_delivery_identity_yields_same_id() {
        assert_eq!(
            derive_correlation_id("scheduler", "req-123"),
            derive_correlation_id("scheduler", "req-123")
        );
    }

    #[test]
    fn test_distinct_identities_yield_distinct_ids() {
        let a = derive_correlation_id("scheduler", "req-123");
        let b = derive_correlation_id("scheduler", "req-124");
        let c = derive_correlation_id("manual", "req-123");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ids_are_compact_and_prefixed() {
        let id = derive_correlation_id("scheduler", "req-123");
        assert!(id.starts_with("sess-"));
        assert_eq!(id.len(), "sess-".len() + 24);
    }

    #[test]
    fn test_field_separator_prevents_boundary_collisions() {
        assert_ne!(
            derive_correlation_id("ab", "c"),
            derive_correlation_id("a", "bc")
        );
    }
}
