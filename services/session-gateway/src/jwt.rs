//! Session token minting and verification
//!
//! Both token kinds are HS256 JWTs signed with the gateway secret. The `typ`
//! claim separates them: a refresh token (long-lived, only ever carried in the
//! httpOnly cookie) is never accepted where an access token is expected, and
//! the reverse.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub typ: TokenType,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token expired")]
    Expired,
    #[error("expected {expected} token, got {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Signs access tokens and verifies both token kinds.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl_secs: u64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], issuer: &str, access_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            access_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    /// Mint a short-lived access token for the subject of a verified refresh token.
    pub fn mint_access(&self, refresh: &Claims) -> Result<String, JwtError> {
        self.mint(
            TokenType::Access,
            &refresh.sub,
            refresh.role.as_deref(),
            self.access_ttl_secs,
        )
    }

    /// Sign a token of the given kind with a fresh `jti`.
    pub fn mint(
        &self,
        typ: TokenType,
        subject: &str,
        role: Option<&str>,
        ttl_secs: u64,
    ) -> Result<String, JwtError> {
        let now = now_secs()?;
        let claims = Claims {
            sub: subject.to_string(),
            role: role.map(str::to_string),
            typ,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl_secs,
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify signature, issuer, expiry and token kind.
    ///
    /// Access tokens get zero expiry leeway; refresh tokens keep the library
    /// default to tolerate clock skew with the authentication service.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        if expected == TokenType::Access {
            validation.leeway = 0;
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })?;

        if claims.typ != expected {
            return Err(JwtError::WrongType {
                expected: expected.as_str(),
                found: claims.typ.as_str(),
            });
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .finish()
    }
}

fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| JwtError::Signing(e.to_string()))
}
