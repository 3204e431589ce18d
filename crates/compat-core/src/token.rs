//! Connection-token claim extraction
//!
//! Legacy tokens are JWT-shaped strings whose payload may embed an `otcd`
//! claim carrying the application-supplied connection data. The adapter
//! never verifies token signatures - validity is the engine's concern at
//! join time - it only lifts that one claim out so the local connection can
//! expose it.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    /// Application-supplied connection data embedded at token mint time.
    #[serde(default)]
    otcd: Option<String>,
}

/// Extract the embedded connection-data claim from a token.
///
/// Returns `None` for absent, opaque, or malformed tokens; a token the
/// adapter cannot read is still a perfectly good token to join with.
pub fn connection_data(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: TokenClaims = serde_json::from_slice(&decoded).ok()?;
    claims.otcd
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::Engine as _;
    use serde_json::json;

    /// Build a JWT-shaped token whose payload carries the given claims.
    pub(crate) fn make_token(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{header}.{payload}.unsigned")
    }

    #[test]
    fn extracts_the_otcd_claim() {
        let token = make_token(json!({ "otcd": "abc", "exp": 4102444800u64 }));
        assert_eq!(connection_data(&token), Some("abc".to_string()));
    }

    #[test]
    fn missing_claim_yields_none() {
        let token = make_token(json!({ "exp": 4102444800u64 }));
        assert_eq!(connection_data(&token), None);
    }

    #[test]
    fn opaque_tokens_yield_none() {
        assert_eq!(connection_data("not-a-jwt"), None);
        assert_eq!(connection_data(""), None);
        assert_eq!(connection_data("a.%%%%.c"), None);
    }

    #[test]
    fn padded_payloads_are_tolerated() {
        use base64::engine::general_purpose::URL_SAFE;
        let payload = URL_SAFE.encode(br#"{"otcd":"padded"}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(connection_data(&token), Some("padded".to_string()));
    }
}
