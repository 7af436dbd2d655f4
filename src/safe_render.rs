//! Safe-render formatting.
//!
//! Every function here is total: it accepts whatever the admin API handed
//! back (null, NaN, strings, nested objects) and always returns something
//! printable. Report views call these at every render boundary so a missing
//! backend field never breaks a page.

use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Fallback used by [`safe_format_dollar`] when the value is not a number.
pub const DOLLAR_FALLBACK: &str = "$0";

/// Shape of a value as seen by the formatters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Raw<'a> {
    Missing,
    Number(f64),
    Bool(bool),
    Text(&'a str),
    Array(&'a [Value]),
    Object(&'a Map<String, Value>),
}

/// Anything the safe-render functions can classify.
pub trait SafeValue {
    fn raw(&self) -> Raw<'_>;
}

impl SafeValue for Value {
    fn raw(&self) -> Raw<'_> {
        match self {
            Value::Null => Raw::Missing,
            Value::Bool(b) => Raw::Bool(*b),
            Value::Number(n) => n.as_f64().map(Raw::Number).unwrap_or(Raw::Missing),
            Value::String(s) => Raw::Text(s),
            Value::Array(items) => Raw::Array(items),
            Value::Object(obj) => Raw::Object(obj),
        }
    }
}

impl SafeValue for f64 {
    fn raw(&self) -> Raw<'_> {
        Raw::Number(*self)
    }
}

impl SafeValue for f32 {
    fn raw(&self) -> Raw<'_> {
        Raw::Number(f64::from(*self))
    }
}

macro_rules! int_safe_value {
    ($($t:ty),*) => {
        $(impl SafeValue for $t {
            fn raw(&self) -> Raw<'_> {
                Raw::Number(*self as f64)
            }
        })*
    };
}

int_safe_value!(i32, i64, u32, u64, usize);

impl SafeValue for bool {
    fn raw(&self) -> Raw<'_> {
        Raw::Bool(*self)
    }
}

impl SafeValue for str {
    fn raw(&self) -> Raw<'_> {
        Raw::Text(self)
    }
}

impl SafeValue for String {
    fn raw(&self) -> Raw<'_> {
        Raw::Text(self)
    }
}

impl<T: SafeValue> SafeValue for Option<T> {
    fn raw(&self) -> Raw<'_> {
        match self {
            Some(v) => v.raw(),
            None => Raw::Missing,
        }
    }
}

impl<T: SafeValue + ?Sized> SafeValue for &T {
    fn raw(&self) -> Raw<'_> {
        (**self).raw()
    }
}

// ---------------------------------------------------------------------------
// Numeric coercion
// ---------------------------------------------------------------------------

/// Coerce a value to a number the way the dashboard treats form/API input:
/// numbers pass through, booleans are 1/0, blank strings are 0, numeric
/// strings parse, everything else is NaN.
pub fn coerce_number<V: SafeValue + ?Sized>(value: &V) -> f64 {
    match value.raw() {
        Raw::Number(n) => n,
        Raw::Bool(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        Raw::Text(s) if s.trim().is_empty() => 0.0,
        Raw::Text(s) => parse_numeric(s).unwrap_or(f64::NAN),
        Raw::Missing | Raw::Array(_) | Raw::Object(_) => f64::NAN,
    }
}

/// Strict numeric parse: digits, sign, decimal point and exponent only.
pub(crate) fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Format with en-US thousands separators, rounding to `max_fraction` digits
/// and trimming trailing zeros down to `min_fraction`.
pub fn format_grouped(value: f64, min_fraction: usize, max_fraction: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    let max_fraction = max_fraction.max(min_fraction);
    let fixed = format!("{:.*}", max_fraction, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (fixed.as_str(), ""),
    };

    let mut frac = frac_part.to_string();
    while frac.len() > min_fraction && frac.ends_with('0') {
        frac.pop();
    }

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let is_zero = int_part.chars().all(|c| c == '0') && frac.chars().all(|c| c == '0');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

// ---------------------------------------------------------------------------
// Formatters
// ---------------------------------------------------------------------------

/// Locale-grouped number. Missing values render as `"0"`, non-numeric text
/// is returned unchanged.
pub fn safe_to_locale_string<V: SafeValue + ?Sized>(value: &V) -> String {
    match value.raw() {
        Raw::Missing => "0".to_string(),
        Raw::Number(n) => format_grouped(n, 0, 3),
        Raw::Text(s) => match parse_numeric(s) {
            Some(n) => format_grouped(n, 0, 3),
            None => s.to_string(),
        },
        Raw::Bool(b) => b.to_string(),
        Raw::Array(items) => Value::Array(items.to_vec()).to_string(),
        Raw::Object(obj) => Value::Object(obj.clone()).to_string(),
    }
}

/// Options for [`safe_format_dollar_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct DollarFormat {
    pub fraction_digits: usize,
    pub fallback: String,
}

impl Default for DollarFormat {
    fn default() -> Self {
        Self {
            fraction_digits: 2,
            fallback: DOLLAR_FALLBACK.to_string(),
        }
    }
}

impl DollarFormat {
    pub fn with_fraction_digits(fraction_digits: usize) -> Self {
        Self {
            fraction_digits,
            ..Self::default()
        }
    }
}

/// USD currency with two fraction digits, `"$0"` when not a number.
pub fn safe_format_dollar<V: SafeValue + ?Sized>(value: &V) -> String {
    safe_format_dollar_with(value, &DollarFormat::default())
}

pub fn safe_format_dollar_with<V: SafeValue + ?Sized>(value: &V, format: &DollarFormat) -> String {
    if matches!(value.raw(), Raw::Missing) {
        return format.fallback.clone();
    }
    let n = coerce_number(value);
    if n.is_nan() {
        return format.fallback.clone();
    }
    let digits = format.fraction_digits;
    let body = format_grouped(n.abs(), digits, digits);
    if n < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-${body}")
    } else {
        format!("${body}")
    }
}

/// Fixed-decimal percentage, `"0%"` when not a number.
pub fn safe_format_percent<V: SafeValue + ?Sized>(value: &V, decimals: usize) -> String {
    if matches!(value.raw(), Raw::Missing) {
        return "0%".to_string();
    }
    let n = coerce_number(value);
    if n.is_nan() {
        return "0%".to_string();
    }
    format!("{:.*}%", decimals, n)
}

/// One-decimal rating, `"0.0"` when not a number.
pub fn safe_format_rating<V: SafeValue + ?Sized>(value: &V) -> String {
    if matches!(value.raw(), Raw::Missing) {
        return "0.0".to_string();
    }
    let n = coerce_number(value);
    if n.is_nan() {
        return "0.0".to_string();
    }
    format!("{n:.1}")
}

/// The array itself, or an empty slice for anything else.
pub fn safe_array(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

/// The object itself, or an empty map for anything else.
pub fn safe_object(value: &Value) -> &Map<String, Value> {
    static EMPTY: OnceLock<Map<String, Value>> = OnceLock::new();
    match value {
        Value::Object(obj) => obj,
        _ => EMPTY.get_or_init(Map::new),
    }
}
