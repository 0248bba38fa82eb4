use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;
use shared_models::auth::JwtClaims;

/// Decode the claims segment of a bearer token.
///
/// The signature is not checked: the client only needs the expiry hint, and the
/// service remains the authority on whether the token is accepted.
pub fn decode_claims(token: &str) -> Result<JwtClaims, String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let claims_b64 = parts[1].trim_end_matches('=');

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(e) => {
            debug!("Failed to decode claims: {}", e);
            return Err("Invalid claims encoding".to_string());
        }
    };

    serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })
}

/// Expiry carried by the token's `exp` claim, if the token is a JWT that has one.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode_claims(token).ok()?;
    let exp = claims.exp?;
    Utc.timestamp_opt(exp, 0).single()
}
