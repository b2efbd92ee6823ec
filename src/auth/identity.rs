use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

/// The authenticated caller, as established by the fronting gateway.
///
/// Session management and OIDC live outside this service; the gateway
/// forwards the verified identity in the `x-user-email` header. A request
/// without it never reaches a handler.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

impl Actor {
    pub fn email(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get("x-user-email")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| value.contains('@'))
            .ok_or_else(|| AppError::Forbidden("missing authenticated user identity".into()))?;

        Ok(Actor(email.to_string()))
    }
}
