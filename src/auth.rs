use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::entities::user;
use crate::error::AppError;
use crate::AppState;

/// The caller identified by an `Authorization: Bearer <api token>` header.
///
/// Handlers that take this extractor reject unauthenticated requests with 401
/// before running any query of their own.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.0.id
    }

    pub fn username(&self) -> &str {
        &self.0.username
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;
        let state = AppState::from_ref(state);

        let found = user::Entity::find()
            .filter(user::Column::ApiToken.eq(token))
            .one(&state.db)
            .await?;

        match found {
            Some(user) => Ok(AuthUser(user)),
            None => {
                tracing::debug!("Rejected request with unknown API token");
                Err(AppError::Unauthenticated)
            }
        }
    }
}
