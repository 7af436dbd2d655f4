//! Lenient decoding helpers for admin API payloads.
//!
//! Report and notification payloads are frequently partial: numbers arrive
//! as null, strings, or not at all. These serde helpers make the "missing
//! number is 0, missing string is empty" rule part of deserialization.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::safe_render::parse_numeric;

pub(crate) fn value_u64(v: &Value, keys: &[&str]) -> Option<u64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(number_of) {
            if n >= 0.0 {
                return Some(n as u64);
            }
        }
    }
    None
}

fn number_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

/// Number, numeric string, or anything else as 0.
pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(number_of(&v).filter(|n| n.is_finite()).unwrap_or(0.0))
}

fn count_of(v: &Value) -> u64 {
    number_of(v)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
        .unwrap_or(0)
}

pub(crate) fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(count_of(&v))
}

/// Count map such as `by_type`. Null or a non-object is empty; each count
/// follows the [`lenient_u64`] rule.
pub(crate) fn lenient_count_map<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<String, u64>, D::Error> {
    let v = Value::deserialize(d)?;
    let Value::Object(obj) = v else {
        return Ok(BTreeMap::new());
    };
    Ok(obj.into_iter().map(|(k, v)| (k, count_of(&v))).collect())
}

/// String as-is, numbers and booleans stringified, null as empty.
pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

pub(crate) fn lenient_opt_string<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Decode a response body, treating an empty body as `T::default()`.
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(value: Value) -> Result<T, ApiError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Rows from a list payload: a bare array, or the first array found under
/// one of `keys`.
pub(crate) fn list_items(value: &Value, keys: &[&str]) -> Vec<Value> {
    if let Some(items) = value.as_array() {
        return items.clone();
    }
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Summary {
        #[serde(default, deserialize_with = "lenient_f64")]
        revenue: f64,
        #[serde(default, deserialize_with = "lenient_u64")]
        orders: u64,
        #[serde(default, deserialize_with = "lenient_string")]
        label: String,
        #[serde(default, deserialize_with = "lenient_opt_string")]
        reference: Option<String>,
    }

    #[test]
    fn lenient_fields_default_to_zero_and_empty() {
        let parsed: Summary = serde_json::from_value(json!({
            "revenue": null,
            "orders": "12",
            "label": 5,
            "reference": 900
        }))
        .expect("lenient decode");
        assert_eq!(
            parsed,
            Summary {
                revenue: 0.0,
                orders: 12,
                label: "5".into(),
                reference: Some("900".into()),
            }
        );

        let empty: Summary = decode_or_default(Value::Null).expect("default");
        assert_eq!(empty, Summary::default());
    }

    #[test]
    fn list_items_accepts_bare_and_wrapped() {
        assert_eq!(list_items(&json!([1, 2]), &["items"]).len(), 2);
        assert_eq!(
            list_items(&json!({ "notifications": [1] }), &["items", "notifications"]).len(),
            1
        );
        assert!(list_items(&json!({ "total": 0 }), &["items"]).is_empty());
    }

    #[test]
    fn value_u64_skips_negative_and_parses_strings() {
        let v = json!({ "n": -1, "m": "4" });
        assert_eq!(value_u64(&v, &["n", "m"]), Some(4));
        assert_eq!(value_u64(&v, &["missing"]), None);
    }
}
