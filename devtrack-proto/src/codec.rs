//! Decoding helpers for API response bodies.
//!
//! The API is inconsistent about wrapping: a payload may arrive inside the
//! `{ success, message, data }` envelope or bare. Project listings may be a
//! paginated object or a plain array. These helpers accept every shape.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::dto::{ApiErrorBody, PaginatedResponse};
use crate::model::Project;

/// Errors decoding a response body.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The body is not valid JSON or does not match the expected shape.
    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the payload of a response: `data` when present and non-null,
/// otherwise the whole body.
#[must_use]
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            Some(data) => {
                map.insert("data".to_string(), data);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Decodes a response body into `T`, unwrapping the envelope first.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the bytes are not JSON or the payload does
/// not match `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let body: Value = serde_json::from_slice(bytes)?;
    Ok(serde_json::from_value(unwrap_envelope(body))?)
}

/// Either listing shape the projects endpoint may return.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Page(PaginatedResponse<T>),
    Items { items: Vec<T> },
    Bare(Vec<T>),
}

/// Decodes a listing body into its items.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload is neither a page, an object
/// with `items`, nor an array.
pub fn decode_listing<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, CodecError> {
    let body: Value = serde_json::from_slice(bytes)?;
    let listing: Listing<T> = serde_json::from_value(unwrap_envelope(body))?;
    Ok(match listing {
        Listing::Page(page) => page.items,
        Listing::Items { items } | Listing::Bare(items) => items,
    })
}

/// Decodes a project listing.
///
/// # Errors
///
/// See [`decode_listing`].
pub fn decode_projects(bytes: &[u8]) -> Result<Vec<Project>, CodecError> {
    decode_listing(bytes)
}

/// Parses an error body, tolerating empty or non-JSON bodies.
#[must_use]
pub fn decode_error(bytes: &[u8]) -> ApiErrorBody {
    serde_json::from_slice(bytes).unwrap_or_default()
}
