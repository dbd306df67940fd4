//! Bearer token verification for inbound agents.
//!
//! Tokens are verified against a shared secret (or a PEM public key for the
//! asymmetric algorithms). Issuance happens elsewhere.

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::str::FromStr;

use crate::BridgeError;

/// Scope every context endpoint requires
pub const READ_CONTEXT_SCOPE: &str = "read_context";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("JWT token expired")]
    Expired,
    #[error("JWT validation error: {0}")]
    Invalid(String),
    #[error("JWT missing required claims")]
    MissingClaims,
    #[error("Insufficient permissions")]
    Forbidden,
}

/// Verified caller
#[derive(Debug, Clone, PartialEq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub scopes: Vec<String>,
}

impl AgentIdentity {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AgentIdentity, AuthError>;
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    /// Audience is only checked when configured
    pub audience: Option<String>,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            audience: None,
        }
    }

    /// JWT_SECRET (required), JWT_ALGORITHM (default HS256), JWT_AUDIENCE (optional)
    pub fn from_env() -> Result<Self, BridgeError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BridgeError::Config("JWT_SECRET is not set".into()))?;
        let algorithm = match std::env::var("JWT_ALGORITHM").ok().filter(|s| !s.is_empty()) {
            Some(raw) => Algorithm::from_str(&raw)
                .map_err(|_| BridgeError::Config(format!("unsupported JWT_ALGORITHM: {raw}")))?,
            None => Algorithm::HS256,
        };
        let audience = std::env::var("JWT_AUDIENCE").ok().filter(|s| !s.is_empty());
        Ok(Self {
            secret,
            algorithm,
            audience,
        })
    }
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(cfg: &AuthConfig) -> Result<Self, BridgeError> {
        let pem = cfg.secret.as_bytes();
        let key = match cfg.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                Ok(DecodingKey::from_secret(pem))
            }
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
            _ => DecodingKey::from_rsa_pem(pem),
        }
        .map_err(|e| BridgeError::Config(format!("invalid JWT key: {e}")))?;

        let mut validation = Validation::new(cfg.algorithm);
        // exp is honored when present but not required
        validation.required_spec_claims.clear();
        match &cfg.audience {
            Some(aud) => validation.set_audience(&[aud.as_str()]),
            None => validation.validate_aud = false,
        }

        Ok(Self { key, validation })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    List(Vec<String>),
    Spaced(String),
}

impl ScopeClaim {
    fn into_vec(self) -> Vec<String> {
        match self {
            ScopeClaim::List(list) => list,
            ScopeClaim::Spaced(s) => s.split_whitespace().map(str::to_string).collect(),
        }
    }
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<String>,
    agent_id: Option<String>,
    scopes: Option<ScopeClaim>,
    scope: Option<ScopeClaim>,
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<AgentIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            }
        })?;

        let claims = data.claims;
        let agent_id = claims
            .sub
            .filter(|s| !s.is_empty())
            .or(claims.agent_id.filter(|s| !s.is_empty()))
            .ok_or(AuthError::MissingClaims)?;
        let scopes = claims
            .scopes
            .or(claims.scope)
            .map(ScopeClaim::into_vec)
            .unwrap_or_default();
        if scopes.is_empty() {
            return Err(AuthError::MissingClaims);
        }

        Ok(AgentIdentity { agent_id, scopes })
    }
}

/// Token from an `Authorization: Bearer <jwt>` value; the last space-separated part
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .split_whitespace()
        .last()
        .filter(|t| !t.eq_ignore_ascii_case("bearer"))
}
