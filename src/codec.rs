//! MessagePack body codec
//!
//! Every encrypted body on the wire is a single MessagePack value, usually a
//! map with string keys. Values are kept as [`rmpv::Value`] so map key order
//! survives a round trip; typed records are read out of them with serde.

use rmpv::Value;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Deepest array/map nesting accepted when decoding
///
/// Real bodies nest a handful of levels; deeper input is rejected before the
/// recursive reader can exhaust a worker thread's stack.
pub const MAX_DEPTH: usize = 64;

/// Encode a value to MessagePack bytes
///
/// # Errors
///
/// Returns an error if the writer rejects the value.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode exactly one MessagePack value from `bytes`
///
/// # Errors
///
/// Returns an error for truncated or malformed input, for nesting deeper than
/// [`MAX_DEPTH`] and for trailing bytes.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut rest = bytes;
    let value = rmpv::decode::read_value_with_max_depth(&mut rest, MAX_DEPTH)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes(rest.len()));
    }
    Ok(value)
}

/// Build a map value with keys in the given order
#[must_use]
pub fn map<K, I>(entries: I) -> Value
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    Value::Map(
        entries
            .into_iter()
            .map(|(key, value)| (Value::String(key.into().into()), value))
            .collect(),
    )
}

/// Read a typed record out of a decoded value
///
/// Unknown map keys are ignored.
///
/// # Errors
///
/// Returns the serde message when the value does not fit `T`.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    rmpv::ext::from_value(value).map_err(|e| e.to_string())
}

/// Render a decoded value as JSON
///
/// Map keys that are not strings are written in their display form, binary
/// and extension payloads become byte arrays, and non-finite floats become
/// `null`.
#[must_use]
pub fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    let bytes = |data: &[u8]| Json::Array(data.iter().map(|&b| Json::from(b)).collect());

    match value {
        Value::Nil => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(n) => n
            .as_u64()
            .map(Json::from)
            .or_else(|| n.as_i64().map(Json::from))
            .unwrap_or(Json::Null),
        Value::F32(f) => serde_json::Number::from_f64(f64::from(*f)).map_or(Json::Null, Json::Number),
        Value::F64(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.as_str().map_or_else(
            || String::from_utf8_lossy(s.as_bytes()).into_owned(),
            str::to_string,
        )),
        Value::Binary(data) => bytes(data),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(key, value)| {
                    let key = key.as_str().map_or_else(|| key.to_string(), str::to_string);
                    (key, to_json(value))
                })
                .collect(),
        ),
        Value::Ext(tag, data) => Json::Array(vec![Json::from(*tag), bytes(data)]),
    }
}
