use async_trait::async_trait;
use paysync_core::identity::{AuthError, BearerCredential, Role, TokenUser, TokenVerifier};
use paysync_shared::Masked;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::upstream::{decode, endpoint, Reply};

/// Token verification against the identity service.
pub struct HttpTokenVerifier {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerifiedResponse {
    #[allow(dead_code)]
    message: Option<String>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct FailureResponse {
    message: Option<String>,
    error: Option<String>,
}

impl FailureResponse {
    fn describe(body: &str, status: u16) -> String {
        match decode::<FailureResponse>(body) {
            Ok(FailureResponse { error: Some(e), .. }) => e,
            Ok(FailureResponse { message: Some(m), .. }) => m,
            _ => format!("status {}", status),
        }
    }
}

impl HttpTokenVerifier {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn call(&self, path: &str, token: &Masked<String>, role: Option<Role>) -> Result<TokenUser, AuthError> {
        let body = VerifyRequest {
            token: format!("{} {}", BearerCredential::SCHEME, token.expose()),
            role: role.as_ref().map(Role::as_str),
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Identity service call to {} failed: {}", path, e);
                AuthError::Unreachable(e.to_string())
            })?;

        let reply = Reply::read(response).await.map_err(|e| {
            error!("Identity service body read from {} failed: {}", path, e);
            AuthError::Unreachable(e.to_string())
        })?;

        match reply {
            Reply::Success { body, .. } => {
                let parsed: VerifiedResponse = decode(&body).map_err(|e| {
                    error!("Identity service returned an unexpected body: {} ({})", e, body);
                    AuthError::Unreachable(format!("undecodable response: {}", e))
                })?;
                debug!("Token resolved to user {}", parsed.user.id);
                Ok(parsed.user)
            }
            Reply::ClientError { status: status @ (400 | 401), body } => {
                let reason = FailureResponse::describe(&body, status);
                debug!("Identity service rejected token: {}", reason);
                Err(AuthError::Rejected(reason))
            }
            Reply::ClientError { status: 403, body } => {
                let reason = FailureResponse::describe(&body, 403);
                warn!("Identity service refused role: {}", reason);
                Err(AuthError::Forbidden(reason))
            }
            Reply::ClientError { status, body } | Reply::ServerError { status, body } => {
                error!("Identity service answered {} on {}: {}", status, path, body);
                Err(AuthError::Unreachable(format!("status {}", status)))
            }
        }
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &Masked<String>) -> Result<TokenUser, AuthError> {
        self.call("/auth/verify-token", token, None).await
    }

    async fn authorize_by_role(&self, token: &Masked<String>, required_role: Role) -> Result<TokenUser, AuthError> {
        self.call("/auth/authorize-by-role", token, Some(required_role)).await
    }
}
