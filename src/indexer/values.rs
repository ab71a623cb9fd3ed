//! Access to the Clarity values carried (hex encoded) by node events.

use clarity::vm::types::{
    ASCIIData, BuffData, CharType, ListData, OptionalData, PrincipalData, ResponseData,
    SequenceData, TupleData, Value,
};
use stacks_codec::codec::{value_from_hex, value_to_hex};

use crate::error::IngestionError;

pub fn decode_clarity_value(raw_value: &str) -> Result<Value, IngestionError> {
    Ok(value_from_hex(raw_value)?)
}

/// `0x` prefixed consensus hex of `value`
pub fn serialize_clarity_value(value: &Value) -> Result<String, IngestionError> {
    Ok(value_to_hex(value)?)
}

pub fn as_tuple(value: &Value) -> Option<&TupleData> {
    match value {
        Value::Tuple(tuple) => Some(tuple),
        _ => None,
    }
}

pub fn tuple_field<'a>(tuple: &'a TupleData, key: &str) -> Option<&'a Value> {
    tuple.get(key).ok()
}

pub fn as_uint(value: &Value) -> Option<u128> {
    match value {
        Value::UInt(n) => Some(*n),
        _ => None,
    }
}

pub fn as_buffer(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Sequence(SequenceData::Buffer(BuffData { data })) => Some(data.as_slice()),
        _ => None,
    }
}

pub fn as_list(value: &Value) -> Option<&[Value]> {
    match value {
        Value::Sequence(SequenceData::List(ListData { data, .. })) => Some(data.as_slice()),
        _ => None,
    }
}

pub fn as_ascii_string(value: &Value) -> Option<String> {
    match value {
        Value::Sequence(SequenceData::String(CharType::ASCII(ASCIIData { data }))) => {
            Some(String::from_utf8_lossy(data).to_string())
        }
        _ => None,
    }
}

pub fn as_principal(value: &Value) -> Option<&PrincipalData> {
    match value {
        Value::Principal(principal) => Some(principal),
        _ => None,
    }
}

/// `None` when `value` is not an optional, `Some(None)` for `none`
pub fn as_optional(value: &Value) -> Option<Option<&Value>> {
    match value {
        Value::Optional(OptionalData { data }) => Some(data.as_deref()),
        _ => None,
    }
}

/// `(committed, inner)` of a response
pub fn as_response(value: &Value) -> Option<(bool, &Value)> {
    match value {
        Value::Response(ResponseData { committed, data }) => Some((*committed, &**data)),
        _ => None,
    }
}

/// Unwraps `(some v)` to `v`, passes bare values through, `None` for `none`
pub fn unwrap_optional(value: &Value) -> Option<&Value> {
    match as_optional(value) {
        Some(inner) => inner,
        None => Some(value),
    }
}
