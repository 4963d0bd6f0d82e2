use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::extract::CurrentUser;
use crate::models::{NewReview, Pagination, Review, ReviewPatch, ReviewStats};
use crate::services::reviews;
use crate::state::AppState;

// POST /reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let mut db = state.db();
    let review = reviews::create_review(&mut db, &current.principal(), &req)?;
    Ok((StatusCode::CREATED, Json(review)))
}

// GET /reviews/:id
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Review>, AppError> {
    let db = state.db();
    Ok(Json(reviews::get_review(&db, id)?))
}

// PATCH /reviews/:id
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ReviewPatch>,
) -> Result<Json<Review>, AppError> {
    let mut db = state.db();
    let review = reviews::update_review(&mut db, &current.principal(), id, &patch)?;
    Ok(Json(review))
}

// DELETE /reviews/:id
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut db = state.db();
    reviews::delete_review(&mut db, &current.principal(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /reviews/services/:service_id/reviews
pub async fn service_reviews(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Review>>, AppError> {
    let db = state.db();
    Ok(Json(reviews::list_service_reviews(&db, service_id, &page)?))
}

// GET /reviews/services/:service_id/stats
pub async fn service_stats(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<ReviewStats>, AppError> {
    let db = state.db();
    Ok(Json(reviews::service_stats(&db, service_id)?))
}
