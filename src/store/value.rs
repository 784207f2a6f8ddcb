//! Supported primitive value kinds and their text encoding.
//!
//! Every stored value is one of seven kinds. `PrimitiveValue` is the closed
//! sum over them, `ValueKind` is its discriminant, and `PreferenceValue`
//! maps plain Rust types onto it so typed reads need no runtime type tests.

use std::{
    collections::{BTreeSet, HashSet},
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use {
    serde_json::{Number, Value, from_str, to_string},
    thiserror::Error,
};

use crate::error::domain::StoreError;

/// Error type for decoding stored values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The stored kind tag is not one of the supported kinds.
    #[error("Unknown value kind: {0}")]
    UnknownKind(String),
    /// The stored text does not parse as the tagged kind.
    #[error("Malformed {kind} value: {reason}")]
    Malformed { kind: ValueKind, reason: String },
}

/// Discriminant of a `PrimitiveValue`.
///
/// Each kind is its own slot in a snapshot, so the same key may hold one
/// value per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    String,
    StringSet,
    Int,
    Long,
    Float,
    Double,
    Boolean,
}

impl ValueKind {
    /// Every supported kind, in tag order.
    pub const ALL: [ValueKind; 7] = [
        ValueKind::String,
        ValueKind::StringSet,
        ValueKind::Int,
        ValueKind::Long,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Boolean,
    ];

    /// Tag stored alongside encoded values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::StringSet => "string_set",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Boolean => "boolean",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = DecodeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        ValueKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| DecodeError::UnknownKind(tag.to_string()))
    }
}

/// A value of one of the supported primitive kinds.
///
/// Floats compare by bit pattern, so a stored `NaN` equals itself and
/// `-0.0` differs from `0.0`, matching their text encoding.
#[derive(Debug, Clone)]
pub enum PrimitiveValue {
    String(String),
    StringSet(BTreeSet<String>),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
}

impl PartialEq for PrimitiveValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PrimitiveValue::String(a), PrimitiveValue::String(b)) => a == b,
            (PrimitiveValue::StringSet(a), PrimitiveValue::StringSet(b)) => a == b,
            (PrimitiveValue::Int(a), PrimitiveValue::Int(b)) => a == b,
            (PrimitiveValue::Long(a), PrimitiveValue::Long(b)) => a == b,
            (PrimitiveValue::Float(a), PrimitiveValue::Float(b)) => a.to_bits() == b.to_bits(),
            (PrimitiveValue::Double(a), PrimitiveValue::Double(b)) => a.to_bits() == b.to_bits(),
            (PrimitiveValue::Boolean(a), PrimitiveValue::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PrimitiveValue {}

impl PrimitiveValue {
    /// Kind of this value, which selects its slot.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            PrimitiveValue::String(_) => ValueKind::String,
            PrimitiveValue::StringSet(_) => ValueKind::StringSet,
            PrimitiveValue::Int(_) => ValueKind::Int,
            PrimitiveValue::Long(_) => ValueKind::Long,
            PrimitiveValue::Float(_) => ValueKind::Float,
            PrimitiveValue::Double(_) => ValueKind::Double,
            PrimitiveValue::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Encodes the value as text for storage.
    ///
    /// Floats use the shortest representation that parses back to the same
    /// bits, which also covers `NaN` and the infinities.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            PrimitiveValue::String(value) => value.clone(),
            // A set of strings always serializes
            PrimitiveValue::StringSet(values) => to_string(values).unwrap_or_default(),
            PrimitiveValue::Int(value) => value.to_string(),
            PrimitiveValue::Long(value) => value.to_string(),
            PrimitiveValue::Float(value) => value.to_string(),
            PrimitiveValue::Double(value) => value.to_string(),
            PrimitiveValue::Boolean(value) => value.to_string(),
        }
    }

    /// Decodes text produced by `encode` for the given kind.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Malformed` if the text is not a valid value of `kind`.
    pub fn decode(kind: ValueKind, text: &str) -> Result<Self, DecodeError> {
        let malformed = |reason: String| DecodeError::Malformed { kind, reason };

        let value = match kind {
            ValueKind::String => PrimitiveValue::String(text.to_string()),
            ValueKind::StringSet => {
                PrimitiveValue::StringSet(from_str(text).map_err(|e| malformed(e.to_string()))?)
            }
            ValueKind::Int => PrimitiveValue::Int(text.parse().map_err(|e| malformed(format!("{e}")))?),
            ValueKind::Long => PrimitiveValue::Long(text.parse().map_err(|e| malformed(format!("{e}")))?),
            ValueKind::Float => PrimitiveValue::Float(text.parse().map_err(|e| malformed(format!("{e}")))?),
            ValueKind::Double => {
                PrimitiveValue::Double(text.parse().map_err(|e| malformed(format!("{e}")))?)
            }
            ValueKind::Boolean => {
                PrimitiveValue::Boolean(text.parse().map_err(|e| malformed(format!("{e}")))?)
            }
        };

        Ok(value)
    }
}

impl Display for PrimitiveValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PrimitiveValue::String(value) => write!(f, "{value:?}"),
            other => f.write_str(&other.encode()),
        }
    }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        PrimitiveValue::String(value.to_string())
    }
}

impl From<HashSet<String>> for PrimitiveValue {
    fn from(values: HashSet<String>) -> Self {
        PrimitiveValue::StringSet(values.into_iter().collect())
    }
}

/// Runtime-typed conversion from JSON.
///
/// Integers inside the `i32` range become `Int`, other integers `Long`, and
/// any other number `Double`. `null`, objects and arrays holding anything
/// but strings are unsupported.
impl TryFrom<Value> for PrimitiveValue {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(PrimitiveValue::String(text)),
            Value::Bool(flag) => Ok(PrimitiveValue::Boolean(flag)),
            Value::Number(number) => number_to_value(&number),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text),
                    _ => Err(StoreError::UnsupportedType {
                        type_name: "array of non-strings".to_string(),
                    }),
                })
                .collect::<Result<BTreeSet<_>, _>>()
                .map(PrimitiveValue::StringSet),
            Value::Null => Err(StoreError::UnsupportedType {
                type_name: "null".to_string(),
            }),
            Value::Object(_) => Err(StoreError::UnsupportedType {
                type_name: "object".to_string(),
            }),
        }
    }
}

fn number_to_value(number: &Number) -> Result<PrimitiveValue, StoreError> {
    if let Some(integer) = number.as_i64() {
        return Ok(match i32::try_from(integer) {
            Ok(small) => PrimitiveValue::Int(small),
            Err(_) => PrimitiveValue::Long(integer),
        });
    }

    number
        .as_f64()
        .map(PrimitiveValue::Double)
        .ok_or_else(|| StoreError::UnsupportedType {
            type_name: format!("number {number}"),
        })
}

impl PrimitiveValue {
    /// Converts the value to JSON.
    ///
    /// # Returns
    ///
    /// `None` for a `NaN` or infinite float, which JSON cannot represent.
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            PrimitiveValue::String(text) => Some(Value::String(text)),
            PrimitiveValue::StringSet(values) => {
                Some(Value::Array(values.into_iter().map(Value::String).collect()))
            }
            PrimitiveValue::Int(integer) => Some(Value::from(integer)),
            PrimitiveValue::Long(integer) => Some(Value::from(integer)),
            PrimitiveValue::Float(float) => Number::from_f64(f64::from(float)).map(Value::Number),
            PrimitiveValue::Double(float) => Number::from_f64(float).map(Value::Number),
            PrimitiveValue::Boolean(flag) => Some(Value::Bool(flag)),
        }
    }
}

/// Rust types that can be stored as a `PrimitiveValue`.
///
/// The type of a read's default selects the slot that is read.
pub trait PreferenceValue: Into<PrimitiveValue> + Sized + Send + 'static {
    /// Slot this type is stored in.
    const KIND: ValueKind;

    /// Extracts a value of this type, or `None` for any other kind.
    fn from_value(value: &PrimitiveValue) -> Option<Self>;
}

macro_rules! preference_value {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for PrimitiveValue {
            fn from(value: $ty) -> Self {
                PrimitiveValue::$variant(value)
            }
        }

        impl PreferenceValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: &PrimitiveValue) -> Option<Self> {
                match value {
                    PrimitiveValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

preference_value!(String, String);
preference_value!(BTreeSet<String>, StringSet);
preference_value!(i32, Int);
preference_value!(i64, Long);
preference_value!(f32, Float);
preference_value!(f64, Double);
preference_value!(bool, Boolean);

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use crate::{
        error::domain::StoreError,
        store::value::{DecodeError, PreferenceValue, PrimitiveValue, ValueKind},
    };

    #[test]
    fn test_kind_tags_parse_back() {
        for kind in ValueKind::ALL {
            assert_eq!(kind.as_str().parse::<ValueKind>().unwrap(), kind);
        }
        assert_eq!(
            "short".parse::<ValueKind>(),
            Err(DecodeError::UnknownKind("short".to_string()))
        );
    }

    #[test]
    fn test_float_encoding_is_exact() {
        for value in [0.1_f64, -2.5e-300, f64::MAX, f64::INFINITY, f64::NEG_INFINITY] {
            let encoded = PrimitiveValue::Double(value).encode();
            assert_eq!(
                PrimitiveValue::decode(ValueKind::Double, &encoded).unwrap(),
                PrimitiveValue::Double(value)
            );
        }

        let nan = PrimitiveValue::decode(ValueKind::Float, &PrimitiveValue::Float(f32::NAN).encode());
        assert!(matches!(nan, Ok(PrimitiveValue::Float(value)) if value.is_nan()));

        let third = PrimitiveValue::Float(1.0 / 3.0);
        assert_eq!(
            PrimitiveValue::decode(ValueKind::Float, &third.encode()).unwrap(),
            third
        );
    }

    #[test]
    fn test_string_set_encoding() {
        let set: BTreeSet<String> = ["b", "a", "with \"quote\""]
            .into_iter()
            .map(String::from)
            .collect();
        let value = PrimitiveValue::StringSet(set);
        let encoded = value.encode();
        assert!(encoded.starts_with(r#"["a","b""#));
        assert_eq!(
            PrimitiveValue::decode(ValueKind::StringSet, &encoded).unwrap(),
            value
        );
    }

    #[test]
    fn test_decode_rejects_malformed_text() {
        assert!(matches!(
            PrimitiveValue::decode(ValueKind::Int, "4294967296"),
            Err(DecodeError::Malformed { kind: ValueKind::Int, .. })
        ));
        assert!(PrimitiveValue::decode(ValueKind::Boolean, "yes").is_err());
        assert!(PrimitiveValue::decode(ValueKind::StringSet, "[1, 2]").is_err());
    }

    #[test]
    fn test_from_json_picks_kind() {
        assert_eq!(
            PrimitiveValue::try_from(json!("hi")).unwrap(),
            PrimitiveValue::String("hi".to_string())
        );
        assert_eq!(PrimitiveValue::try_from(json!(7)).unwrap(), PrimitiveValue::Int(7));
        assert_eq!(
            PrimitiveValue::try_from(json!(5_000_000_000_i64)).unwrap(),
            PrimitiveValue::Long(5_000_000_000)
        );
        assert_eq!(
            PrimitiveValue::try_from(json!(1.5)).unwrap(),
            PrimitiveValue::Double(1.5)
        );
        assert_eq!(
            PrimitiveValue::try_from(json!(true)).unwrap(),
            PrimitiveValue::Boolean(true)
        );
        assert_eq!(
            PrimitiveValue::try_from(json!(["x", "y", "x"])).unwrap().kind(),
            ValueKind::StringSet
        );
    }

    #[test]
    fn test_from_json_rejects_unsupported() {
        for value in [json!(null), json!({ "a": 1 }), json!(["a", 1])] {
            assert!(matches!(
                PrimitiveValue::try_from(value),
                Err(StoreError::UnsupportedType { .. })
            ));
        }
    }

    #[test]
    fn test_typed_extraction_does_not_coerce() {
        let value = PrimitiveValue::Int(3);
        assert_eq!(i32::from_value(&value), Some(3));
        assert_eq!(i64::from_value(&value), None);
        assert_eq!(String::from_value(&value), None);
        assert_eq!(<f64 as PreferenceValue>::KIND, ValueKind::Double);
    }

    #[test]
    fn test_floats_compare_by_bits() {
        assert_eq!(PrimitiveValue::Double(f64::NAN), PrimitiveValue::Double(f64::NAN));
        assert_eq!(PrimitiveValue::Float(f32::NAN), PrimitiveValue::Float(f32::NAN));
        assert_ne!(PrimitiveValue::Double(-0.0), PrimitiveValue::Double(0.0));
        assert_ne!(PrimitiveValue::Float(1.0), PrimitiveValue::Double(1.0));
    }

    #[test]
    fn test_non_finite_floats_have_no_json_form() {
        assert_eq!(PrimitiveValue::Double(f64::NAN).into_json(), None);
        assert_eq!(PrimitiveValue::Float(f32::INFINITY).into_json(), None);
        assert_eq!(PrimitiveValue::Double(2.5).into_json(), Some(json!(2.5)));
        assert_eq!(
            PrimitiveValue::StringSet(BTreeSet::from(["b".to_string(), "a".to_string()]))
                .into_json(),
            Some(json!(["a", "b"]))
        );
    }
}
