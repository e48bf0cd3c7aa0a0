//! Opaque continuation tokens around store-native keys.
//!
//! A token is the compact JSON of the key, base64 encoded. The payload is
//! never inspected here; a token that fails to decode means "first page".

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

/// Encodes a native key as a token; `None` in, `None` out.
pub fn encode_cursor(key: Option<&Value>) -> Option<String> {
    encode_key(key)
}

/// Decodes a token back into the native key; any failure yields `None`.
pub fn decode_cursor(token: Option<&str>) -> Option<Value> {
    decode_key(token)
}

/// Typed form of [`encode_cursor`].
pub fn encode_key<K: Serialize>(key: Option<&K>) -> Option<String> {
    let key = key?;
    match serde_json::to_vec(key) {
        Ok(json) => Some(STANDARD.encode(json)),
        Err(err) => {
            debug!(error = %err, "cursor encode failed");
            None
        }
    }
}

/// Typed form of [`decode_cursor`]. A token whose payload does not fit `K`
/// also yields `None`.
pub fn decode_key<K: DeserializeOwned>(token: Option<&str>) -> Option<K> {
    let token = token?;
    let bytes = match STANDARD.decode(token.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, "cursor is not base64");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(key) => Some(key),
        Err(err) => {
            debug!(error = %err, "cursor payload rejected");
            None
        }
    }
}
