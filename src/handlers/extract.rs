use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Principal, User};
use crate::services::auth::TokenKind;
use crate::state::AppState;

/// The user behind a valid `Authorization: Bearer <access token>` header.
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn principal(&self) -> Principal {
        self.0.principal()
    }
}

/// A [`CurrentUser`] holding the admin role.
pub struct AdminUser(pub User);

impl AdminUser {
    pub fn principal(&self) -> Principal {
        self.0.principal()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| AppError::unauthenticated("not authenticated"))?;
        let claims = state
            .tokens
            .verify(token, TokenKind::Access)
            .ok_or_else(|| AppError::unauthenticated("could not validate credentials"))?;

        let user = {
            let db = state.db();
            queries::get_user(&db, claims.sub)?
        };
        user.map(CurrentUser)
            .ok_or_else(|| AppError::unauthenticated("could not validate credentials"))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.principal().is_admin() {
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(AdminUser(user))
    }
}
