//! Continuation tokens.
//!
//! A token is the base64 form of a small JSON document naming the last
//! item a page consumed. Callers treat it as opaque.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::storage::ItemKey;

#[derive(Debug, Serialize, Deserialize)]
struct TokenBody {
    pk: String,
    sk: i64,
}

/// Encode the key a page stopped at.
pub fn encode(key: &ItemKey) -> String {
    let body = TokenBody {
        pk: key.partition.clone(),
        sk: key.sort,
    };
    // Serializing a string and an integer cannot fail.
    let json = serde_json::to_vec(&body).unwrap_or_default();
    BASE64_URL_SAFE_NO_PAD.encode(json)
}

/// Decode a token and check it belongs to `partition`.
pub fn decode(token: &str, partition: &str) -> Result<ItemKey> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| TimelineError::InvalidToken(format!("not base64: {}", e)))?;
    let body: TokenBody = serde_json::from_slice(&bytes)
        .map_err(|e| TimelineError::InvalidToken(format!("malformed body: {}", e)))?;
    if body.pk != partition {
        return Err(TimelineError::InvalidToken(format!(
            "token was issued for '{}', not '{}'",
            body.pk, partition
        )));
    }
    Ok(ItemKey::new(body.pk, body.sk))
}
