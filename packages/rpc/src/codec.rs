//! Payload codecs: raw call payload text <-> typed values.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::CodecError;

/// Wire encoding of a route's payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// UTF-8 JSON text.
    Json,
    /// Opaque string, passed through unchanged.
    Raw,
}

/// A payload codec.
///
/// The decode and encode halves are separate traits so a route can decode
/// one type and encode another.
pub trait PayloadCodec: Send + Sync + 'static {
    fn kind(&self) -> PayloadKind;
}

/// Decode raw payload text into `T`.
pub trait Decode<T>: PayloadCodec {
    /// Decode `raw` into `empty`, the instance produced by the route's
    /// empty-value factory. Top-level fields the payload omits keep their
    /// values from `empty`; a field the payload carries replaces the empty
    /// value's field whole.
    fn decode(&self, raw: &str, empty: T) -> Result<T, CodecError>;
}

/// Encode `T` into raw payload text.
pub trait Encode<T>: PayloadCodec {
    fn encode(&self, value: &T) -> Result<String, CodecError>;
}

/// JSON codec backed by serde_json.
///
/// # Example
///
/// ```rust
/// use poseidon_rpc::{Decode, Encode, JsonCodec};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
/// struct Move {
///     x: i32,
///     y: i32,
/// }
///
/// let decoded = JsonCodec.decode(r#"{"x": 3}"#, Move::default()).unwrap();
/// assert_eq!(decoded, Move { x: 3, y: 0 });
/// assert_eq!(JsonCodec.encode(&decoded).unwrap(), r#"{"x":3,"y":0}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Json
    }
}

impl<T: Serialize + DeserializeOwned> Decode<T> for JsonCodec {
    fn decode(&self, raw: &str, empty: T) -> Result<T, CodecError> {
        let incoming: Value = serde_json::from_str(raw).map_err(CodecError::from_decode)?;
        // The factory's value failing to serialize is a wiring defect, not
        // a bad payload.
        let base = serde_json::to_value(&empty).map_err(CodecError::from_encode)?;

        match fill_missing(base, &incoming) {
            Some(filled) => serde_json::from_value(filled).or_else(|filled_err| {
                // Filling breaks one-key enum objects; decode as sent.
                serde_json::from_value(incoming).map_err(|_| CodecError::from_decode(filled_err))
            }),
            None => serde_json::from_value(incoming).map_err(CodecError::from_decode),
        }
    }
}

impl<T: Serialize> Encode<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::from_encode)
    }
}

/// Copy top-level keys the payload omits from `base`.
///
/// Only applies when both sides are objects and the payload leaves at least
/// one key out; nested values are never merged.
fn fill_missing(base: Value, incoming: &Value) -> Option<Value> {
    let (Value::Object(base), Value::Object(incoming)) = (base, incoming) else {
        return None;
    };
    if base.keys().all(|key| incoming.contains_key(key)) {
        return None;
    }

    let mut filled = incoming.clone();
    for (key, value) in base {
        if !filled.contains_key(&key) {
            filled.insert(key, value);
        }
    }
    Some(Value::Object(filled))
}

/// Pass-through codec for string routes. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl PayloadCodec for RawCodec {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Raw
    }
}

impl Decode<String> for RawCodec {
    fn decode(&self, raw: &str, _empty: String) -> Result<String, CodecError> {
        Ok(raw.to_string())
    }
}

impl Encode<String> for RawCodec {
    fn encode(&self, value: &String) -> Result<String, CodecError> {
        Ok(value.clone())
    }
}
