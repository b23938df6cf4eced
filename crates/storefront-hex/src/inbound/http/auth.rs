use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use storefront_types::domain::identity::AnonymousId;
use storefront_types::ports::Store;

use super::server::AppState;
use crate::application::token_service::INVALID_IDENTITY;
use crate::application::IssuedToken;
use crate::errors::AppError;

/// Identity taken from the `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AnonymousUser(pub AnonymousId);

impl<R: Store> FromRequestParts<AppState<R>> for AnonymousUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<R>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized(INVALID_IDENTITY.into()))?;
        state.tokens.verify(token).map(AnonymousUser)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut split = value.splitn(2, ' ');

    let scheme = split.next()?;
    let token = split.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}

pub(super) async fn issue_token<R: Store>(
    State(state): State<AppState<R>>,
) -> Result<Json<IssuedToken>, AppError> {
    Ok(Json(state.tokens.issue()?))
}
