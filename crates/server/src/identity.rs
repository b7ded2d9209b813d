//! Bearer token verification against the external identity provider.
//!
//! The server never issues tokens. Callers present an HS256 JWT minted
//! by the identity provider; verification checks the signature, expiry,
//! and (when configured) issuer and audience claims.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use pinboard_core::config::IdentityConfig;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims carried by an identity provider token.
///
/// Only `sub`, `iat`, and `exp` are guaranteed; the profile hints are
/// used to seed the user record on first sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stable subject identifier for the account.
    pub sub: String,
    /// Display name hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar URL hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Username hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued at (Unix timestamp).
    pub iat: u64,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

/// Verifies bearer tokens presented to the API.
#[derive(Clone)]
pub struct IdentityVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    /// Create a verifier from identity configuration.
    pub fn new(config: &IdentityConfig) -> Result<Self, pinboard_core::Error> {
        config
            .validate()
            .map_err(pinboard_core::Error::InvalidConfig)?;

        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        })
    }

    /// Create a verifier with the fixed test secret.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self::new(&IdentityConfig::for_testing()).expect("test identity config is valid")
    }

    /// Verify a token and return its claims.
    ///
    /// The returned error message is safe to surface to callers; it
    /// never echoes token contents.
    pub fn verify(&self, token: &str) -> Result<Claims, &'static str> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => Err(match err.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidSignature => "invalid signature",
                ErrorKind::InvalidIssuer => "invalid issuer",
                ErrorKind::InvalidAudience => "invalid audience",
                ErrorKind::InvalidToken => "invalid token",
                _ => "token validation failed",
            }),
        }
    }

    /// Mint a token with the verifier's own secret.
    ///
    /// **For testing only.** Production tokens come from the identity
    /// provider, never from this server.
    pub fn issue_for_testing(&self, claims: &Claims) -> String {
        encode(&Header::default(), claims, &self.encoding_key).expect("test token encoding")
    }
}

/// Build claims for a subject with an expiry relative to now.
///
/// **For testing only.**
pub fn test_claims(subject: &str, name: &str, email: &str) -> Claims {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Claims {
        sub: subject.to_string(),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        picture: None,
        preferred_username: None,
        iss: None,
        aud: None,
        iat: now,
        exp: now + 3600,
    }
}
