//! HTTP basic-auth verification for inbound webhooks.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::HeaderMap;
use subtle::ConstantTimeEq;

/// Decode an `Authorization: Basic <b64>` header into `(username, password)`.
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn ct_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verify the request carries exactly the expected credentials (constant-time compare).
pub fn verify_basic_auth(headers: &HeaderMap, username: &str, password: &str) -> bool {
    match parse_basic_auth(headers) {
        Some((user, pass)) => {
            // Both halves are always compared.
            let user_ok = ct_eq(&user, username);
            let pass_ok = ct_eq(&pass, password);
            user_ok & pass_ok
        }
        None => false,
    }
}

/// Build the header value a client would send.
pub fn encode_basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}
