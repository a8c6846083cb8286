//! Fuzz target for argument type inference.
//!
//! Builds arbitrary nested values and checks that inference either picks a
//! wire type that agrees with the input or reports an error.

#![no_main]

use arbitrary::Arbitrary;
use dbus2vdr::{infer, Value, WireValue};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Bool(bool),
    Byte(u8),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Str(String),
    Array(Vec<FuzzValue>),
    Struct(Vec<FuzzValue>),
    Variant(Box<FuzzValue>),
}

impl From<FuzzValue> for Value {
    fn from(value: FuzzValue) -> Self {
        match value {
            FuzzValue::Bool(v) => Value::Bool(v),
            FuzzValue::Byte(v) => Value::Byte(v),
            FuzzValue::Int32(v) => Value::Int32(v),
            FuzzValue::Int64(v) => Value::Int64(v),
            FuzzValue::UInt64(v) => Value::UInt64(v),
            FuzzValue::Double(v) => Value::Double(v),
            FuzzValue::Str(v) => Value::Str(v),
            FuzzValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            FuzzValue::Struct(items) => Value::Struct(items.into_iter().map(Value::from).collect()),
            FuzzValue::Variant(inner) => Value::Variant(Box::new(Value::from(*inner))),
        }
    }
}

fuzz_target!(|input: FuzzValue| {
    let value = Value::from(input);
    let first = infer(&value);
    // Inference is deterministic
    assert_eq!(first.is_ok(), infer(&value).is_ok());

    if let Ok(wire) = first {
        match (&wire, value.unwrap_variant()) {
            (WireValue::Str(_), Value::Str(_)) => {}
            (WireValue::Int(_), v) => assert!(v.as_i64().is_some()),
            (WireValue::StrList(items), Value::Array(raw)) => assert_eq!(items.len(), raw.len()),
            (WireValue::IntList(items), Value::Array(raw)) => assert_eq!(items.len(), raw.len()),
            (wire, raw) => panic!("{:?} inferred from {:?}", wire, raw),
        }
    }
});
