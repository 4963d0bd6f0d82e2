use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::extract::CurrentUser;
use crate::models::{User, UserPatch};
use crate::services::accounts;
use crate::state::AppState;

// GET /users/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

// PATCH /users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    let db = state.db();
    let user = accounts::update_profile(&db, &current.principal(), &patch)?;
    Ok(Json(user))
}

// GET /users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let db = state.db();
    Ok(Json(accounts::get_user(&db, id)?))
}

// GET /users/email/:email
pub async fn get_user_by_email(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<User>, AppError> {
    let db = state.db();
    Ok(Json(accounts::get_user_by_email(&db, &email)?))
}
