//! # Typed Leaf Values
//!
//! The tagged union stored at each leaf path. A leaf holds exactly one
//! active variant; changing a leaf's variant means replacing the leaf,
//! never mutating it in place, since the backing representation is
//! variant-specific.
//!
//! Decoding from untyped JSON follows a fixed precedence so overlapping
//! representations (a JSON number could be `Int32` or `Numeric`) resolve
//! deterministically. Non-integral numbers decode to `Numeric` rather than
//! truncating to `Int32`.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Fixed-point decimal with two fractional digits, held as a scaled i64.
///
/// `Numeric::from_f64(12.34)` stores `1234`. The scale is fixed; values
/// whose scaled form overflows i64 are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Numeric(i64);

impl Numeric {
    /// Number of fractional digits.
    pub const SCALE: u32 = 2;

    const FACTOR: i64 = 100;

    /// Build from a float, rounding to the fixed scale. Returns `None` when
    /// the value is not finite or overflows the scaled range.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * Self::FACTOR as f64).round();
        if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Build from an integer. Returns `None` on scaled overflow.
    pub fn from_i64(value: i64) -> Option<Self> {
        value.checked_mul(Self::FACTOR).map(Self)
    }

    /// The raw scaled representation (`12.34` -> `1234`).
    pub fn scaled(&self) -> i64 {
        self.0
    }

    /// The value as a float.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / Self::FACTOR as f64
    }
}

/// A leaf value. Exactly one variant is active per leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedValue {
    /// 32-bit signed integer
    Int32(i32),
    /// UTF-8 text
    Text(String),
    /// Homogeneous text array
    TextArray(Vec<String>),
    /// Homogeneous 32-bit integer array
    Int32Array(Vec<i32>),
    /// UTC timestamp
    Timestamp(DateTime<Utc>),
    /// Boolean
    Bool(bool),
    /// Fixed-point decimal, scale 2
    Numeric(Numeric),
    /// UUID
    Uuid(Uuid),
    /// Raw bytes; base64 in the JSON form
    Binary(Vec<u8>),
    /// Planar point
    GeoPoint { x: f64, y: f64 },
}

impl TypedValue {
    /// Decode an untyped JSON value, applying the variant precedence.
    ///
    /// Precedence: integer numbers -> `Int32` (out-of-range integers fall
    /// through to `Numeric`), non-integral numbers -> `Numeric`, strings ->
    /// `Text`, booleans -> `Bool`, arrays -> `TextArray` when the first
    /// element is a string, `Int32Array` when it is any number (floats
    /// truncate inside arrays). `null`, objects, empty arrays, and arrays of
    /// anything else are unrepresentable and return `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return match i32::try_from(i) {
                        Ok(small) => Some(Self::Int32(small)),
                        Err(_) => Numeric::from_i64(i).map(Self::Numeric),
                    };
                }
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
                    Some(Self::Int32(f as i32))
                } else {
                    Numeric::from_f64(f).map(Self::Numeric)
                }
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => Self::array_from_json(items),
            Value::Null | Value::Object(_) => None,
        }
    }

    /// Array decoding: the first element picks the array variant, elements
    /// of any other type are skipped.
    fn array_from_json(items: &[Value]) -> Option<Self> {
        match items.first()? {
            Value::String(_) => Some(Self::TextArray(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )),
            Value::Number(_) => Some(Self::Int32Array(
                items
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as i32))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Encode back to JSON for read responses and broadcasts.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int32(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.clone()),
            Self::TextArray(items) => Value::from(items.clone()),
            Self::Int32Array(items) => Value::from(items.clone()),
            Self::Timestamp(ts) => Value::from(ts.to_rfc3339()),
            Self::Bool(b) => Value::from(*b),
            Self::Numeric(n) => Value::from(n.as_f64()),
            Self::Uuid(u) => Value::from(u.to_string()),
            Self::Binary(bytes) => {
                Value::from(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Self::GeoPoint { x, y } => serde_json::json!({ "x": x, "y": y }),
        }
    }

    /// Variant name, for logs.
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Int32(_) => "int32",
            Self::Text(_) => "text",
            Self::TextArray(_) => "text_array",
            Self::Int32Array(_) => "int32_array",
            Self::Timestamp(_) => "timestamp",
            Self::Bool(_) => "bool",
            Self::Numeric(_) => "numeric",
            Self::Uuid(_) => "uuid",
            Self::Binary(_) => "binary",
            Self::GeoPoint { .. } => "geo_point",
        }
    }
}
