//! Content hashing for syncable entities.
//!
//! An entity's outbound payload is encoded as canonical JSON (object keys
//! sorted at every depth, no whitespace) and hashed with SHA-256. The result
//! is rendered as `sha256:<hex>` and compared with the hash stored on the
//! entity for a target system. Nothing here touches storage: the stored hash
//! is only written after a confirmed delivery.

use serde_json::Value;
use sha2::{Digest, Sha256};
use sync_database::{SyncOperation, TargetSystem};

/// Result of comparing an entity's current content with its stored hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDetection {
    pub needs_sync: bool,
    pub new_hash: String,
}

/// Decide whether `payload` needs to be written back, given the hash stored
/// for the target (`None` when the entity was never synced there).
pub fn detect_change(payload: &Value, stored_hash: Option<&str>) -> ChangeDetection {
    let new_hash = content_hash(payload);
    let needs_sync = stored_hash != Some(new_hash.as_str());
    ChangeDetection {
        needs_sync,
        new_hash,
    }
}

/// Stable hash of a JSON document, independent of object key order.
pub fn content_hash(payload: &Value) -> String {
    sha256_prefixed(&canonical_json(payload))
}

/// Deterministic idempotency key for one logical change.
///
/// A change is the transition from `previous_hash` (the hash last committed
/// for the target) to `content_hash`. Re-detecting the same transition
/// yields the same key, while content that flips back to an earlier
/// version (A, B, A) produces a fresh key for the second A.
pub fn idempotency_key_for(
    entity_type: &str,
    entity_id: &str,
    target: TargetSystem,
    operation: SyncOperation,
    previous_hash: Option<&str>,
    content_hash: &str,
) -> String {
    let material = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        entity_type,
        entity_id,
        target.as_str(),
        operation.as_str(),
        previous_hash.unwrap_or("-"),
        content_hash
    );
    let digest = Sha256::digest(material.as_bytes());
    format!(
        "{}:{}:{}:{}",
        target.as_str(),
        entity_type,
        operation.as_str(),
        &hex::encode(digest)[..32]
    )
}

/// Encode a JSON value with sorted object keys and no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single compact encoding
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn sha256_prefixed(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("sha256:{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_ignores_key_order() {
        let a: Value =
            serde_json::from_str(r#"{"name":"Ada","address":{"city":"Oslo","zip":"0150"}}"#)
                .unwrap();
        let b: Value =
            serde_json::from_str(r#"{"address":{"zip":"0150","city":"Oslo"},"name":"Ada"}"#)
                .unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_has_prefix_and_is_stable() {
        let payload = json!({"name": "Ada"});
        let hash = content_hash(&payload);
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), "sha256:".len() + 64);
        assert_eq!(hash, content_hash(&json!({"name": "Ada"})));
    }

    #[test]
    fn canonical_json_is_compact_and_sorted() {
        let value = json!({"b": [1, {"z": null, "a": true}], "a": "x\"y"});
        assert_eq!(canonical_json(&value), r#"{"a":"x\"y","b":[1,{"a":true,"z":null}]}"#);
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(content_hash(&json!([1, 2])), content_hash(&json!([2, 1])));
    }

    #[test]
    fn absent_stored_hash_needs_sync() {
        let detection = detect_change(&json!({"name": "Ada"}), None);
        assert!(detection.needs_sync);
        assert!(detection.new_hash.starts_with("sha256:"));
    }

    #[test]
    fn matching_stored_hash_does_not_need_sync() {
        let payload = json!({"name": "Ada"});
        let stored = content_hash(&payload);
        let detection = detect_change(&payload, Some(&stored));
        assert!(!detection.needs_sync);
        assert_eq!(detection.new_hash, stored);
    }

    #[test]
    fn changed_content_needs_sync() {
        let stored = content_hash(&json!({"name": "Ada"}));
        let detection = detect_change(&json!({"name": "Ada L."}), Some(&stored));
        assert!(detection.needs_sync);
        assert_ne!(detection.new_hash, stored);
    }

    #[test]
    fn idempotency_key_is_deterministic_per_change() {
        let prev = content_hash(&json!({"name": "Ada"}));
        let hash = content_hash(&json!({"name": "Ada L."}));
        let key = |entity_id: &str, target, op, prev: Option<&str>| {
            idempotency_key_for("contact", entity_id, target, op, prev, &hash)
        };

        let first = key("42", TargetSystem::Splynx, SyncOperation::Update, Some(&prev));
        assert_eq!(first, key("42", TargetSystem::Splynx, SyncOperation::Update, Some(&prev)));
        assert!(first.starts_with("splynx:contact:update:"));

        assert_ne!(first, key("42", TargetSystem::Erpnext, SyncOperation::Update, Some(&prev)));
        assert_ne!(first, key("42", TargetSystem::Splynx, SyncOperation::Delete, Some(&prev)));
        assert_ne!(first, key("43", TargetSystem::Splynx, SyncOperation::Update, Some(&prev)));
        assert_ne!(first, key("42", TargetSystem::Splynx, SyncOperation::Update, None));
    }

    #[test]
    fn reverting_content_gets_a_new_key() {
        let a = content_hash(&json!({"plan": "basic"}));
        let b = content_hash(&json!({"plan": "pro"}));

        let key = |previous: Option<&str>| {
            idempotency_key_for(
                "contact",
                "42",
                TargetSystem::Splynx,
                SyncOperation::Update,
                previous,
                &a,
            )
        };
        let a_first = key(None);
        let a_again = key(Some(b.as_str()));
        assert_ne!(a_first, a_again);
    }
}
