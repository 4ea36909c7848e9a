pub mod auth;

pub use auth::{require_user, AuthPipeline, AuthenticatedUser, ExtractBearer, Flow, Interceptor, RequestContext, VerifyToken};
