use axum::{
    extract::{FromRequestParts, FromRef},
    http::{header::AUTHORIZATION, request::Parts},
};
use crate::state::AppState;
use crate::domain::models::auth::Claims;
use crate::domain::models::user::{Requester, Role};
use crate::error::AppError;
use std::sync::Arc;
use tracing::Span;

/// Any authenticated caller.
pub struct AuthUser(pub Requester);

/// An authenticated admin or trainer.
pub struct StaffUser(pub Requester);

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    parts.headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub(crate) fn requester_from_claims(claims: Claims) -> Result<Requester, AppError> {
    let role: Role = claims.role.parse().map_err(|_| AppError::Unauthorized)?;
    Ok(Requester { user_id: claims.sub, email: claims.email, role })
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);
        let claims = app_state.auth_service.verify_access_token(token)?;
        let requester = requester_from_claims(claims)?;

        Span::current().record("user_id", requester.user_id.as_str());

        Ok(AuthUser(requester))
    }
}

impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(requester) = AuthUser::from_request_parts(parts, state).await?;
        if !requester.is_privileged() {
            return Err(AppError::Forbidden("Staff access required".into()));
        }
        Ok(StaffUser(requester))
    }
}
