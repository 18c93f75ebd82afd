//! Unverified access-token claims and the offline expiry check.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::Role;

/// Claims carried in the payload segment of an access token.
///
/// Only `exp` is required; everything else is informational. The client never
/// verifies signatures (it does not hold the signing secret), so these claims
/// must only drive local, fail-closed decisions such as "is this token worth
/// sending or should we refresh first".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: Option<Role>,

    #[serde(default)]
    pub customer_id: Option<String>,

    /// `access` or `refresh` as issued by the platform.
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,

    /// Expiration as seconds since the Unix epoch.
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,

    #[serde(default, deserialize_with = "optional_numeric_date")]
    pub iat: Option<i64>,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// A token whose expiry is at or before `now` is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    #[error("token is not a three-segment JWT")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Base64(String),

    #[error("token payload is not valid claims JSON: {0}")]
    Claims(String),
}

/// Decode the payload segment of a JWT without verifying its signature.
pub fn decode_unverified(token: &str) -> Result<AccessClaims, TokenDecodeError> {
    let mut segments = token.trim().split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenDecodeError::Malformed);
    };
    if header.is_empty() || payload.is_empty() {
        return Err(TokenDecodeError::Malformed);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenDecodeError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenDecodeError::Claims(e.to_string()))
}

/// Offline expiry check.
///
/// Absent, malformed and undecodable tokens count as expired (fail-closed).
pub fn is_token_expired(token: Option<&str>, now: DateTime<Utc>) -> bool {
    match token.map(decode_unverified) {
        Some(Ok(claims)) => claims.is_expired_at(now),
        Some(Err(_)) | None => true,
    }
}

fn numeric_date<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = f64::deserialize(deserializer)?;
    if !seconds.is_finite() {
        return Err(serde::de::Error::custom("numeric date must be finite"));
    }
    Ok(seconds.floor() as i64)
}

fn optional_numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        Some(seconds) if seconds.is_finite() => Ok(Some(seconds.floor() as i64)),
        Some(_) => Err(serde::de::Error::custom("numeric date must be finite")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use proptest::prelude::*;
    use serde_json::json;

    fn mint(exp: i64) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            &json!({
                "sub": "0191d1b2-7a3c-7f00-8000-000000000001",
                "email": "cfo@example.com",
                "role": "admin",
                "type": "access",
                "exp": exp,
                "iat": exp - 3600,
            }),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("failed to encode jwt")
    }

    #[test]
    fn decodes_platform_claims() {
        let now = Utc::now();
        let claims = decode_unverified(&mint(now.timestamp() + 60)).unwrap();
        assert_eq!(claims.email.as_deref(), Some("cfo@example.com"));
        assert_eq!(claims.token_type.as_deref(), Some("access"));
        assert!(claims.role.unwrap().is_admin());
    }

    #[test]
    fn future_expiry_is_not_expired() {
        let now = Utc::now();
        let token = mint(now.timestamp() + 3600);
        assert!(!is_token_expired(Some(&token), now));
    }

    #[test]
    fn past_expiry_is_expired() {
        let now = Utc::now();
        let token = mint(now.timestamp() - 1);
        assert!(is_token_expired(Some(&token), now));
    }

    #[test]
    fn expiry_equal_to_now_is_expired() {
        let now = Utc::now();
        let token = mint(now.timestamp());
        assert!(is_token_expired(Some(&token), now));
    }

    #[test]
    fn absent_and_garbage_tokens_are_expired() {
        let now = Utc::now();
        assert!(is_token_expired(None, now));
        assert!(is_token_expired(Some("garbage"), now));
        assert!(is_token_expired(Some("a.b.c"), now));
        assert!(is_token_expired(Some(""), now));
    }

    #[test]
    fn payload_without_exp_is_rejected() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig");
        assert!(matches!(
            decode_unverified(&token),
            Err(TokenDecodeError::Claims(_))
        ));
        assert!(is_token_expired(Some(&token), Utc::now()));
    }

    #[test]
    fn fractional_exp_is_floored() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":1700000000.9}"#);
        let token = format!("h.{payload}.s");
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.exp, 1_700_000_000);
        assert_eq!(
            claims.expires_at(),
            DateTime::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn four_segments_are_malformed() {
        assert_eq!(
            decode_unverified("a.b.c.d"),
            Err(TokenDecodeError::Malformed)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: expiry flips exactly at `now`.
        #[test]
        fn expiry_matches_offset_sign(offset in -86_400i64..86_400i64) {
            let now = Utc::now();
            let token = mint(now.timestamp() + offset);
            prop_assert_eq!(is_token_expired(Some(&token), now), offset <= 0);
        }

        /// Property: arbitrary strings never panic and never count as valid
        /// unless they decode to claims.
        #[test]
        fn arbitrary_input_fails_closed(raw in "\\PC{0,64}") {
            let now = Utc::now() + Duration::seconds(1);
            if decode_unverified(&raw).is_err() {
                prop_assert!(is_token_expired(Some(&raw), now));
            }
        }
    }
}
