//! Target codec — canonical encoding of a delivery target and the job id derived from it.
//!
//! The encoding is JSON with every object's keys in sorted order, so two equal
//! targets always produce the same bytes no matter how their maps were built.

use apodbot_core::error::{ApodError, Result};
use apodbot_core::types::Target;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Namespace prefix that keeps delivery jobs apart from other engine jobs.
pub const JOB_ID_PREFIX: &str = "send_task_";

/// Canonical JSON value for a target.
pub fn to_value(target: &Target) -> Value {
    // Target has only string-keyed maps, so this cannot fail in practice.
    canonicalize(serde_json::to_value(target).unwrap_or(Value::Null))
}

/// Decode a target from its JSON value form.
pub fn from_value(value: &Value) -> Result<Target> {
    serde_json::from_value(value.clone())
        .map_err(|e| ApodError::Decode(format!("malformed target: {e}")))
}

/// Canonical byte encoding.
pub fn serialize(target: &Target) -> Vec<u8> {
    serde_json::to_vec(&to_value(target)).unwrap_or_default()
}

/// Inverse of [`serialize`].
pub fn deserialize(bytes: &[u8]) -> Result<Target> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ApodError::Decode(format!("target is not JSON: {e}")))?;
    from_value(&value)
}

/// Deterministic scheduler job id: `send_task_<sha256 of canonical bytes>`.
pub fn job_id(target: &Target) -> String {
    let digest = Sha256::digest(serialize(target));
    format!("{JOB_ID_PREFIX}{digest:x}")
}

/// Whether a persisted target value denotes the same destination as `target`.
///
/// The raw value is decoded first so rows written before a field gained a
/// default still compare equal.
pub fn same_target(raw: &Value, target: &Target) -> bool {
    from_value(raw).is_ok_and(|decoded| to_value(&decoded) == to_value(target))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group(id: &str) -> Target {
        Target::new("telegram", id).with_self_id("bot-1")
    }

    #[test]
    fn test_job_id_is_stable() {
        let t = group("42");
        assert_eq!(job_id(&t), job_id(&t.clone()));
        assert!(job_id(&t).starts_with(JOB_ID_PREFIX));
        assert_eq!(job_id(&t).len(), JOB_ID_PREFIX.len() + 64);
    }

    #[test]
    fn test_job_id_survives_roundtrip() {
        let mut t = group("42");
        t.extra.insert("topic".into(), json!({"b": 2, "a": 1}));
        let decoded = deserialize(&serialize(&t)).unwrap();
        assert_eq!(decoded, t);
        assert_eq!(job_id(&decoded), job_id(&t));
    }

    #[test]
    fn test_distinct_targets_distinct_ids() {
        let targets = vec![
            group("42"),
            group("43"),
            Target::new("telegram", "42"),
            Target::new("discord", "42").with_self_id("bot-1"),
            group("42").private(true),
            Target::new("telegram", "42").with_self_id("bot-2"),
        ];
        let mut ids: Vec<String> = targets.iter().map(job_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), targets.len());
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = from_value(&json!({
            "platform": "telegram", "id": "1",
            "extra": {"x": 1, "y": {"q": true, "p": false}}
        }))
        .unwrap();
        let b = from_value(&json!({
            "extra": {"y": {"p": false, "q": true}, "x": 1},
            "id": "1", "platform": "telegram"
        }))
        .unwrap();
        assert_eq!(serialize(&a), serialize(&b));
        assert_eq!(job_id(&a), job_id(&b));
    }

    #[test]
    fn test_canonical_bytes_sorted() {
        let bytes = serialize(&Target::new("telegram", "1"));
        let text = String::from_utf8(bytes).unwrap();
        let channel = text.find("\"channel\"").unwrap();
        let platform = text.find("\"platform\"").unwrap();
        assert!(channel < platform);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(deserialize(b"not json"), Err(ApodError::Decode(_))));
        assert!(matches!(
            from_value(&json!({"platform": 5})),
            Err(ApodError::Decode(_))
        ));
    }

    #[test]
    fn test_same_target_with_missing_defaults() {
        let raw = json!({"platform": "telegram", "id": "42"});
        assert!(same_target(&raw, &Target::new("telegram", "42")));
        assert!(!same_target(&raw, &Target::new("telegram", "43")));
        assert!(!same_target(&json!("garbage"), &Target::new("telegram", "42")));
    }
}
