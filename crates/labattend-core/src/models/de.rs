//! Lenient deserializers for backend fields whose JSON type varies.
//!
//! The backend has shipped numeric and string ids, populated and bare member
//! references, and both arrays and comma separated strings for duty days.
//! Field names drift too (`_id` next to a virtual `id`, `timestamp` next to
//! `createdAt`), so models fold those spellings with [`with_aliases`] instead
//! of serde's `alias`, which rejects a payload carrying two of them.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Canonical (camelCase) field name and the other spellings folded into it.
pub type KeyGroup = (&'static str, &'static [&'static str]);

/// Rename alias keys of an object to their canonical key.
///
/// The canonical key wins, then aliases in listed order. A null never
/// shadows a later non-null value.
pub fn fold_aliases(value: &mut Value, groups: &[KeyGroup]) {
    let Value::Object(map) = value else {
        return;
    };
    for (canonical, aliases) in groups {
        let mut chosen = map.remove(*canonical);
        for alias in aliases.iter() {
            if let Some(candidate) = map.remove(*alias) {
                if chosen.as_ref().map_or(true, Value::is_null) {
                    chosen = Some(candidate);
                }
            }
        }
        if let Some(v) = chosen {
            map.insert((*canonical).to_string(), v);
        }
    }
}

/// Deserialize through a type's derived (`remote = "Self"`) impl after
/// folding alias keys.
pub fn with_aliases<'de, D, T, F>(
    deserializer: D,
    groups: &[KeyGroup],
    derived: F,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    F: FnOnce(Value) -> Result<T, serde_json::Error>,
{
    let mut value = Value::deserialize(deserializer)?;
    fold_aliases(&mut value, groups);
    derived(value).map_err(serde::de::Error::custom)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Required id that may arrive as a JSON number or string.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected string or number id, got {}", value)))
}

/// Optional scalar that may arrive as a number, string, empty string or null.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value))
}

/// Member reference: a bare id or a populated member object.
pub fn member_ref<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Object(map) => map
            .get("id")
            .and_then(scalar_to_string)
            .or_else(|| map.get("_id").and_then(scalar_to_string)),
        other => scalar_to_string(other),
    })
}

/// Day list: `["Senin", "Rabu"]` or `"Senin, Rabu"`.
pub fn day_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct LenientFields {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "member_ref")]
        member: Option<String>,
        #[serde(default, deserialize_with = "day_list")]
        days: Vec<String>,
    }

    #[test]
    fn test_numeric_and_string_ids() {
        let a: LenientFields = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        let b: LenientFields = serde_json::from_str(r#"{"id": "m-7"}"#).unwrap();
        assert_eq!(a.id, "7");
        assert_eq!(b.id, "m-7");
        assert!(serde_json::from_str::<LenientFields>(r#"{"id": null}"#).is_err());
    }

    #[test]
    fn test_member_ref_populated_object() {
        let p: LenientFields =
            serde_json::from_str(r#"{"id": 1, "member": {"_id": "abc", "nama": "Budi"}}"#).unwrap();
        assert_eq!(p.member.as_deref(), Some("abc"));

        let p: LenientFields = serde_json::from_str(r#"{"id": 1, "member": 12}"#).unwrap();
        assert_eq!(p.member.as_deref(), Some("12"));
    }

    #[test]
    fn test_fold_aliases_prefers_canonical_then_first_non_null() {
        const GROUPS: &[KeyGroup] = &[("id", &["_id"]), ("scannedAt", &["timestamp", "createdAt"])];

        let mut v = serde_json::json!({"_id": "665f", "id": "665f-virtual", "nama": "Budi"});
        fold_aliases(&mut v, GROUPS);
        assert_eq!(v, serde_json::json!({"id": "665f-virtual", "nama": "Budi"}));

        let mut v = serde_json::json!({"id": null, "_id": 9, "createdAt": "b", "timestamp": "a"});
        fold_aliases(&mut v, GROUPS);
        assert_eq!(v, serde_json::json!({"id": 9, "scannedAt": "a"}));

        let mut v = serde_json::json!(["not", "an", "object"]);
        fold_aliases(&mut v, GROUPS);
        assert_eq!(v, serde_json::json!(["not", "an", "object"]));
    }

    #[test]
    fn test_day_list_shapes() {
        let p: LenientFields = serde_json::from_str(r#"{"id": 1, "days": "Senin, Rabu,"}"#).unwrap();
        assert_eq!(p.days, vec!["Senin", "Rabu"]);

        let p: LenientFields = serde_json::from_str(r#"{"id": 1, "days": ["Kamis"]}"#).unwrap();
        assert_eq!(p.days, vec!["Kamis"]);

        let p: LenientFields = serde_json::from_str(r#"{"id": 1, "days": null}"#).unwrap();
        assert!(p.days.is_empty());
    }
}
