//! Compact HS256 bearer tokens.
//!
//! `base64url(header) . base64url(claims) . base64url(hmac_sha256(header.claims))`

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature mismatch")]
    BadSignature,
    #[error("unsupported token algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("token lifetime is out of range")]
    LifetimeOutOfRange,
}

/// Authenticated caller, decoded from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now(), ttl)
    }

    pub fn issue_at(
        &self,
        subject: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(TokenError::LifetimeOutOfRange)?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let signing_input = format!("{}.{}", encode_part(&header)?, encode_part(&claims)?);
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments".to_string()));
        };

        let header: Header = decode_part(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_part(claims_b64)?;
        if claims.sub.trim().is_empty() {
            return Err(TokenError::Malformed("empty subject".to_string()));
        }
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(Identity {
            subject: claims.sub,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| TokenError::Malformed(format!("invalid signing key: {}", e)))
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn encode_part<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_part<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TokenError::Malformed(format!("timestamp {} out of range", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("unit-test-secret")
    }

    #[test]
    fn issued_token_verifies_to_subject() {
        let token = verifier().issue("alice", Duration::minutes(30)).unwrap();
        let identity = verifier().verify(&token).unwrap();
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.expires_at - identity.issued_at, Duration::minutes(30));
    }

    #[test]
    fn lifetime_past_the_calendar_is_refused() {
        let result = verifier().issue("alice", Duration::days(365 * 300_000));
        assert_eq!(result, Err(TokenError::LifetimeOutOfRange));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let issued = Utc::now() - Duration::hours(2);
        let token = verifier().issue_at("alice", issued, Duration::minutes(30)).unwrap();
        assert_eq!(verifier().verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn token_from_other_secret_has_bad_signature() {
        let token = TokenVerifier::new("someone-else")
            .issue("mallory", Duration::minutes(5))
            .unwrap();
        assert_eq!(verifier().verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_claims_fail_signature_check() {
        let token = verifier().issue("alice", Duration::minutes(5)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&serde_json::json!({ "sub": "bob", "iat": 0, "exp": i64::MAX / 2 }))
                .unwrap(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert_eq!(verifier().verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(verifier().verify("not-a-token"), Err(TokenError::Malformed(_))));
        assert!(matches!(verifier().verify("a.b.c.d"), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn non_hs256_header_is_refused() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"alice","iat":0,"exp":9999999999}"#);
        let token = format!("{}.{}.", header, claims);
        assert_eq!(
            verifier().verify(&token),
            Err(TokenError::UnsupportedAlgorithm("none".to_string()))
        );
    }
}
