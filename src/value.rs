//! JSON encoding of stored values.
//!
//! Values are stored as JSON text. Decoding needs the target type, which is
//! always named by the caller. Payloads that are not UTF-8 fail to decode like
//! any other malformed JSON.

use crate::{
    error::{Fault, Outcome},
    storage::types::Value,
};
use serde::{de::DeserializeOwned, Serialize};

pub fn type_name<T: ?Sized>() -> &'static str {
    std::any::type_name::<T>()
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Outcome<Value> {
    serde_json::to_vec(value).map(Value::from).map_err(|source| Fault::Encode {
        type_name: type_name::<T>(),
        source,
    })
}

/// Decodes `payload`, naming it `key` in the fault on failure.
pub fn decode<T: DeserializeOwned>(key: &str, payload: &[u8]) -> Outcome<T> {
    serde_json::from_slice(payload).map_err(|source| Fault::Decode {
        key: key.to_owned(),
        type_name: type_name::<T>(),
        source,
    })
}
