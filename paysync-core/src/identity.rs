use async_trait::async_trait;
use paysync_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::UserId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller as resolved by the identity service. Lives for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenUser {
    pub id: UserId,
    pub email: String,
    #[serde(rename = "user_role")]
    pub role: Role,
}

/// Result of reading the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerCredential {
    MissingHeader,
    WrongScheme,
    Token(Masked<String>),
}

impl BearerCredential {
    pub const SCHEME: &'static str = "Bearer";

    pub fn parse(header: Option<&str>) -> Self {
        let value = match header.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return BearerCredential::MissingHeader,
        };

        let Some((scheme, token)) = value.split_once(' ') else {
            return BearerCredential::WrongScheme;
        };

        let token = token.trim();
        if !scheme.eq_ignore_ascii_case(Self::SCHEME) || token.is_empty() || token.contains(' ') {
            return BearerCredential::WrongScheme;
        }

        BearerCredential::Token(Masked::new(token.to_string()))
    }

    /// The token, or the malformed-credential error for the other two cases.
    pub fn into_token(self) -> Result<Masked<String>, AuthError> {
        match self {
            BearerCredential::Token(token) => Ok(token),
            BearerCredential::MissingHeader => {
                Err(AuthError::Malformed("Missing authorization token".to_string()))
            }
            BearerCredential::WrongScheme => {
                Err(AuthError::Malformed("Authorization header must use the Bearer scheme".to_string()))
            }
        }
    }
}

/// Failure kinds callers treat differently: malformed and rejected
/// credentials are the client's problem, an unreachable identity service is
/// ours.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed credential: {0}")]
    Malformed(String),
    #[error("Credential rejected: {0}")]
    Rejected(String),
    #[error("Insufficient permissions: {0}")]
    Forbidden(String),
    #[error("Identity service unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &Masked<String>) -> Result<TokenUser, AuthError>;

    async fn authorize_by_role(
        &self,
        token: &Masked<String>,
        required_role: Role,
    ) -> Result<TokenUser, AuthError>;
}
