use axum::{
    extract::{FromRequestParts, FromRef},
    http::request::Parts,
};
use crate::state::AppState;
use crate::domain::models::user::Requester;
use crate::api::extractors::auth::{bearer_token, requester_from_claims};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, Span};

/// The caller if a valid bearer token is present. A missing or invalid
/// token yields an anonymous guest rather than a rejection.
pub struct MaybeAuthUser(pub Option<Requester>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeAuthUser(None));
        };

        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);
        let requester = match app_state.auth_service.verify_access_token(token).and_then(requester_from_claims) {
            Ok(r) => r,
            Err(_) => {
                debug!("MaybeAuth: invalid token, treating caller as guest");
                return Ok(MaybeAuthUser(None));
            }
        };

        Span::current().record("user_id", requester.user_id.as_str());
        Ok(MaybeAuthUser(Some(requester)))
    }
}
