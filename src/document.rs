//! The document representation shared by the codec and the index engine.

use serde_json::Value;

/// A stored document: always a JSON object, per spec §3.
pub type Document = serde_json::Map<String, Value>;

/// What a projection function yields for one document.
///
/// Mirrors `shadb.py`'s duck-typed return value (`None`, a scalar, or a
/// list) with a real enum, since the normalization and null/list policy
/// (spec §3 I3/I4) need to branch on which of the three it is.
#[derive(Debug, Clone)]
pub enum Projected {
    Null,
    One(Value),
    Many(Vec<Value>),
}

impl Projected {
    pub fn from_option(value: Option<Value>) -> Self {
        match value {
            Some(Value::Null) | None => Projected::Null,
            Some(v) => Projected::One(v),
        }
    }

    /// Normalize into zero-or-more keys, applying spec §3's string-passthrough /
    /// canonical-JSON rule to each one.
    pub fn into_keys(self) -> Vec<String> {
        match self {
            Projected::Null => Vec::new(),
            Projected::One(v) => vec![normalize_key(&v)],
            Projected::Many(vs) => vs.iter().map(normalize_key).collect(),
        }
    }

    /// Same as `into_keys`, except a null projection under an `index-null`
    /// descriptor yields one row keyed on normalized `null` (spec §3 I3),
    /// matching `shadb.py`'s `json.dumps(None)` normalization of `None`.
    pub fn into_keys_with_null_policy(self, index_null: bool) -> Vec<String> {
        match self {
            Projected::Null if index_null => vec![normalize_key(&Value::Null)],
            other => other.into_keys(),
        }
    }
}

/// Strings pass through unchanged; everything else is serialized to
/// canonical JSON. `serde_json::Value`'s default `Map` is a `BTreeMap`
/// (the `preserve_order` feature is off in this crate), so
/// `serde_json::to_string` already sorts object keys — no extra work
/// needed to get spec §3's "canonical JSON normalization ... sorted keys".
pub fn normalize_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).expect("Value serialization cannot fail"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_pass_through() {
        let p = Projected::One(json!("alice"));
        assert_eq!(p.into_keys(), vec!["alice".to_string()]);
    }

    #[test]
    fn tuples_normalize_to_sorted_json() {
        let p = Projected::One(json!(["derek", "anderson"]));
        assert_eq!(p.into_keys(), vec![r#"["derek","anderson"]"#.to_string()]);
    }

    #[test]
    fn null_yields_no_keys() {
        assert!(Projected::Null.into_keys().is_empty());
        assert!(Projected::from_option(None).into_keys().is_empty());
        assert!(Projected::from_option(Some(Value::Null))
            .into_keys()
            .is_empty());
    }

    #[test]
    fn null_with_index_null_yields_literal_null_key() {
        assert_eq!(
            Projected::Null.into_keys_with_null_policy(true),
            vec!["null".to_string()]
        );
        assert!(Projected::Null.into_keys_with_null_policy(false).is_empty());
    }

    #[test]
    fn many_yields_one_key_per_element() {
        let p = Projected::Many(vec![json!("derek"), json!("anderson")]);
        assert_eq!(
            p.into_keys(),
            vec!["derek".to_string(), "anderson".to_string()]
        );
    }
}
