//! Dynamic values exchanged with VDR and wire type inference.
//!
//! [`Value`] is the transport-neutral shape of call arguments, replies and
//! signal parameters. Some VDR methods take a D-Bus variant and cannot infer
//! the contained type from context; [`infer`] tags such arguments as a
//! [`WireValue`].

use crate::error::VdrError;
use std::fmt;

/// A dynamically typed D-Bus value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Str(String),
    ObjectPath(String),
    Array(Vec<Value>),
    Struct(Vec<Value>),
    /// A D-Bus dictionary (`a{..}`), entries in wire order.
    Dict(Vec<(Value, Value)>),
    Variant(Box<Value>),
    /// A value the client does not decode, kept as its D-Bus signature.
    Unsupported(String),
}

impl Value {
    /// Strip any number of variant wrappers.
    pub fn unwrap_variant(&self) -> &Value {
        let mut value = self;
        while let Value::Variant(inner) = value {
            value = inner;
        }
        value
    }

    /// Owned version of [`Value::unwrap_variant`].
    pub fn into_unwrapped(self) -> Value {
        let mut value = self;
        while let Value::Variant(inner) = value {
            value = *inner;
        }
        value
    }

    /// Integer content widened to `i64`, for any integer width.
    pub fn as_i64(&self) -> Option<i64> {
        match *self.unwrap_variant() {
            Value::Byte(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::Int64(v) => Some(v),
            Value::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_variant() {
            Value::Str(s) | Value::ObjectPath(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unwrap_variant() {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Elements of an array or fields of a struct.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self.unwrap_variant() {
            Value::Array(items) | Value::Struct(items) => Some(items),
            _ => None,
        }
    }

    fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::Byte(_)
                | Value::Int16(_)
                | Value::UInt16(_)
                | Value::Int32(_)
                | Value::UInt32(_)
                | Value::Int64(_)
                | Value::UInt64(_)
        )
    }

    /// Short description of the value's shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::ObjectPath(_) => "object path",
            Value::Array(items) if items.is_empty() => "empty list",
            Value::Array(_) => "list",
            Value::Struct(_) => "struct",
            Value::Dict(_) => "dictionary",
            Value::Variant(_) => "variant",
            Value::Unsupported(_) => "unsupported value",
            _ => "integer",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::ObjectPath(p) => write!(f, "{}", p),
            Value::Array(items) => write_seq(f, "[", items, "]"),
            Value::Struct(fields) => write_seq(f, "(", fields, ")"),
            Value::Dict(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Variant(inner) => write!(f, "<{}>", inner),
            Value::Unsupported(signature) => write!(f, "<unsupported {}>", signature),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::UInt32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Value::Array(values.into_iter().map(Value::Str).collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(values: Vec<&str>) -> Self {
        Value::Array(values.into_iter().map(Value::from).collect())
    }
}

impl From<Vec<i32>> for Value {
    fn from(values: Vec<i32>) -> Self {
        Value::Array(values.into_iter().map(Value::Int32).collect())
    }
}

impl From<WireValue> for Value {
    fn from(value: WireValue) -> Self {
        value.into_variant()
    }
}

/// Conversion out of a [`Value`], looking through variant wrappers.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|v| u32::try_from(v).ok())
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        match *value.unwrap_variant() {
            Value::UInt64(v) => Some(v),
            _ => value.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match *value.unwrap_variant() {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value.unwrap_variant() {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

/// A value tagged with an explicit D-Bus type, sent inside a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    Str(String),
    Int(i32),
    StrList(Vec<String>),
    IntList(Vec<i32>),
}

impl WireValue {
    /// D-Bus signature of the tagged value.
    pub fn signature(&self) -> &'static str {
        match self {
            WireValue::Str(_) => "s",
            WireValue::Int(_) => "i",
            WireValue::StrList(_) => "as",
            WireValue::IntList(_) => "ai",
        }
    }

    /// Wrap the tagged value in a variant, ready to be sent.
    pub fn into_variant(self) -> Value {
        let inner = match self {
            WireValue::Str(s) => Value::Str(s),
            WireValue::Int(i) => Value::Int32(i),
            WireValue::StrList(items) => items.into(),
            WireValue::IntList(items) => items.into(),
        };
        Value::Variant(Box::new(inner))
    }
}

/// Infer the wire type of a native value.
///
/// Strings, integers fitting into `i32`, and non-empty homogeneous lists of
/// either are accepted. Every other shape fails with
/// [`VdrError::TypeInference`].
pub fn infer(value: &Value) -> Result<WireValue, VdrError> {
    match value {
        Value::Str(s) => Ok(WireValue::Str(s.clone())),
        v if v.is_integer() => int32(v).map(WireValue::Int),
        Value::Array(items) if items.is_empty() => Err(rejected(value, "empty list")),
        Value::Array(items) if items.iter().all(|item| matches!(item, Value::Str(_))) => {
            Ok(WireValue::StrList(
                items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect(),
            ))
        }
        Value::Array(items) if items.iter().all(Value::is_integer) => items
            .iter()
            .map(int32)
            .collect::<Result<Vec<_>, _>>()
            .map(WireValue::IntList),
        Value::Array(_) => Err(rejected(value, "mixed list")),
        other => Err(rejected(other, other.shape())),
    }
}

fn int32(value: &Value) -> Result<i32, VdrError> {
    value
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| rejected(value, "integer out of range"))
}

fn rejected(value: &Value, shape: &str) -> VdrError {
    VdrError::TypeInference {
        value: value.to_string(),
        shape: shape.to_string(),
    }
}
