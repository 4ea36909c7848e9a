use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use paysync_core::{AuthError, BearerCredential, ReconcileError, Role, TokenUser, TokenVerifier};
use paysync_shared::Masked;
use std::sync::Arc;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Interceptor pipeline
// ============================================================================

/// What an interceptor sees and enriches. Carries no framework types.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub authorization: Option<String>,
    pub credential: Option<Masked<String>>,
    pub user: Option<TokenUser>,
}

impl RequestContext {
    pub fn new(authorization: Option<String>) -> Self {
        Self {
            authorization,
            ..Self::default()
        }
    }
}

/// Caller identity handed to handlers once the pipeline completes.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: TokenUser,
    pub credential: Masked<String>,
}

pub enum Flow {
    Continue(RequestContext),
    Respond(ReconcileError),
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, ctx: RequestContext) -> Flow;
}

/// Parses the `Authorization` header into a bearer credential.
pub struct ExtractBearer;

#[async_trait]
impl Interceptor for ExtractBearer {
    async fn intercept(&self, mut ctx: RequestContext) -> Flow {
        match BearerCredential::parse(ctx.authorization.as_deref()).into_token() {
            Ok(token) => {
                ctx.credential = Some(token);
                Flow::Continue(ctx)
            }
            Err(e) => Flow::Respond(e.into()),
        }
    }
}

/// Resolves the credential to a user through the identity service.
pub struct VerifyToken {
    verifier: Arc<dyn TokenVerifier>,
    required_role: Option<Role>,
}

impl VerifyToken {
    pub fn any_role(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier,
            required_role: None,
        }
    }

    pub fn with_role(verifier: Arc<dyn TokenVerifier>, role: Role) -> Self {
        Self {
            verifier,
            required_role: Some(role),
        }
    }
}

#[async_trait]
impl Interceptor for VerifyToken {
    async fn intercept(&self, mut ctx: RequestContext) -> Flow {
        let Some(token) = ctx.credential.as_ref() else {
            return Flow::Respond(AuthError::Malformed("Missing authorization token".to_string()).into());
        };

        let result = match self.required_role {
            Some(role) => self.verifier.authorize_by_role(token, role).await,
            None => self.verifier.verify(token).await,
        };

        match result {
            Ok(user) => {
                tracing::debug!("Authenticated user {} as {}", user.id, user.role);
                ctx.user = Some(user);
                Flow::Continue(ctx)
            }
            Err(e) => {
                tracing::warn!("Authentication failed: {}", e);
                Flow::Respond(e.into())
            }
        }
    }
}

/// Ordered interceptors. The first `Respond` short-circuits the rest.
pub struct AuthPipeline {
    steps: Vec<Box<dyn Interceptor>>,
}

impl AuthPipeline {
    pub fn new(steps: Vec<Box<dyn Interceptor>>) -> Self {
        Self { steps }
    }

    /// `[ExtractBearer, VerifyToken]` for any authenticated caller.
    pub fn authenticated(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self::new(vec![Box::new(ExtractBearer), Box::new(VerifyToken::any_role(verifier))])
    }

    pub async fn run(&self, mut ctx: RequestContext) -> Flow {
        for step in &self.steps {
            match step.intercept(ctx).await {
                Flow::Continue(next) => ctx = next,
                respond => return respond,
            }
        }
        Flow::Continue(ctx)
    }
}

// ============================================================================
// axum adapter
// ============================================================================

pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    match state.auth.run(RequestContext::new(authorization)).await {
        Flow::Continue(RequestContext {
            credential: Some(credential),
            user: Some(user),
            ..
        }) => {
            req.extensions_mut().insert(AuthenticatedUser { user, credential });
            next.run(req).await
        }
        Flow::Continue(_) => {
            AppError::InternalServerError("auth pipeline finished without a user".to_string()).into_response()
        }
        Flow::Respond(err) => AppError::from(err).into_response(),
    }
}
