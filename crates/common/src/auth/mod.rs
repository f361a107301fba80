//! Identity verification and role model
//!
//! Provides:
//! - The closed set of workflow roles
//! - The `IdentityProvider` seam the core calls to authenticate a caller
//! - A JWT-backed provider (HS256) for tokens issued by the external auth service
//! - The `AuthContext` extractor used by HTTP handlers

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// The five fixed workflow roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Author,
    Reviewer,
    Editor,
    #[serde(rename = "Production Editor")]
    ProductionEditor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "Author",
            Role::Reviewer => "Reviewer",
            Role::Editor => "Editor",
            Role::ProductionEditor => "Production Editor",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Author" => Ok(Role::Author),
            "Reviewer" => Ok(Role::Reviewer),
            "Editor" => Ok(Role::Editor),
            "Production Editor" | "ProductionEditor" => Ok(Role::ProductionEditor),
            "Admin" => Ok(Role::Admin),
            other => Err(AppError::InvalidFormat {
                message: format!("Unknown role: {}", other),
            }),
        }
    }
}

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub verified: bool,
    pub email: String,
    pub name: Option<String>,
}

impl Identity {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Seam to the external credential subsystem
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer credential and resolve the caller
    async fn authenticate(&self, token: &str) -> Result<Identity>;
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Workflow role
    pub role: Role,

    /// Whether the account completed email verification
    #[serde(default)]
    pub verified: bool,

    /// Contact address used for notifications
    pub email: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Verifies tokens signed by the auth service with a shared secret
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Create a provider for the given HS256 secret
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for an identity (development tooling and tests)
    pub fn issue_token(&self, identity: &Identity, ttl_secs: i64) -> Result<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: identity.user_id.to_string(),
            role: identity.role,
            verified: identity.verified,
            email: identity.email.clone(),
            name: identity.name.clone(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            }
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Not authorized, token failed".to_string(),
                },
            })
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Identity> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Token subject is not a user id".to_string(),
        })?;

        Ok(Identity {
            user_id,
            role: claims.role,
            verified: claims.verified,
            email: claims.email,
            name: claims.name,
        })
    }
}

/// Extract the token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,

    /// Request ID for tracing
    pub request_id: String,
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<dyn IdentityProvider>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Not authorized, no token".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Not authorized, no token".to_string(),
        })?;

        let provider = Arc::<dyn IdentityProvider>::from_ref(state);
        let identity = provider.authenticate(token).await?;

        if !identity.verified {
            return Err(AppError::Unauthorized {
                message: "Email address is not verified".to_string(),
            });
        }

        Ok(AuthContext {
            identity,
            request_id,
        })
    }
}
