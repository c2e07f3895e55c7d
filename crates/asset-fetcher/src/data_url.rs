//! Decoding of `data:` locators

use crate::error::{FetchError, Result};
use base64::Engine;
use bytes::Bytes;

/// Decode the payload of a `data:[<mediatype>][;base64],<data>` locator
pub fn decode(locator: &str) -> Result<Bytes> {
    let rest = locator
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::DataUrl("missing data: prefix".to_string()))?;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::DataUrl("missing ',' separator".to_string()))?;

    let is_base64 = meta
        .rsplit_once(';')
        .is_some_and(|(_, param)| param.eq_ignore_ascii_case("base64"));

    if is_base64 {
        // Tolerate line breaks and percent-escaped padding from some encoders
        let cleaned: String = urlencoding::decode(payload)
            .map_err(|e| FetchError::DataUrl(e.to_string()))?
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        base64::engine::general_purpose::STANDARD
            .decode(cleaned.as_bytes())
            .map(Bytes::from)
            .map_err(|e| FetchError::DataUrl(e.to_string()))
    } else {
        Ok(Bytes::from(
            urlencoding::decode_binary(payload.as_bytes()).into_owned(),
        ))
    }
}
