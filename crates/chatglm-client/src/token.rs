//! Signed bearer tokens derived from a `<id>.<secret>` API key.
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::errors::ClientError;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a generated token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(300);

/// Builds an HS256 JWT for the `Authorization` header.
///
/// The secret half of the key is base64 and its decoded bytes are the HMAC
/// key. Claims carry the key id plus millisecond `timestamp` and `exp`.
pub fn generate_token(api_key: &str, ttl: Duration) -> Result<String, ClientError> {
    generate_token_at(api_key, ttl, chrono::Utc::now().timestamp_millis())
}

pub(crate) fn generate_token_at(
    api_key: &str,
    ttl: Duration,
    now_ms: i64,
) -> Result<String, ClientError> {
    let (id, secret) = split_api_key(api_key)?;
    let key = STANDARD
        .decode(secret)
        .map_err(|e| ClientError::Token(format!("api key secret is not base64: {e}")))?;

    let ttl_ms = i64::try_from(ttl.as_millis())
        .map_err(|_| ClientError::Token("token ttl out of range".into()))?;
    let exp = now_ms
        .checked_add(ttl_ms)
        .ok_or_else(|| ClientError::Token("token expiry out of range".into()))?;
    let header = json!({ "alg": "HS256", "sign_type": "SIGN", "typ": "JWT" });
    let claims = json!({
        "api_key": id,
        "exp": exp,
        "timestamp": now_ms,
    });
    let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| ClientError::Token(format!("invalid signing key: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{signing_input}.{signature}"))
}

fn split_api_key(api_key: &str) -> Result<(&str, &str), ClientError> {
    let mut parts = api_key.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(secret), None) => Ok((id, secret)),
        _ => Err(ClientError::Token("api key format error".into())),
    }
}

fn encode_segment(value: &serde_json::Value) -> Result<String, ClientError> {
    let bytes = serde_json::to_vec(value).map_err(|e| ClientError::Token(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
