use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::handlers::extract::CurrentUser;
use crate::models::{Credentials, NewUser, User};
use crate::services::accounts;
use crate::services::auth::TokenPair;
use crate::state::AppState;

// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = accounts::register(&state, &req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

// POST /auth/login
#[derive(Serialize)]
pub struct LoginResponse {
    user: User,
    tokens: TokenPair,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(creds): Json<Credentials>,
) -> Result<Json<LoginResponse>, AppError> {
    let (user, tokens) = accounts::login(&state, &creds).await?;
    Ok(Json(LoginResponse { user, tokens }))
}

// POST /auth/refresh
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let db = state.db();
    let tokens = accounts::refresh(&db, &state.tokens, &req.refresh_token)?;
    Ok(Json(tokens))
}

// POST /auth/logout
// Tokens are stateless; the client drops them.
pub async fn logout(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    tracing::info!(user_id = %user.id, "user logged out");
    Json(serde_json::json!({ "message": "Successfully logged out" }))
}
