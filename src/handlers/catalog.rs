use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::extract::AdminUser;
use crate::models::{NewService, Pagination, Service, ServicePatch, ServiceQuery};
use crate::services::catalog;
use crate::state::AppState;

// GET /services?q=&price_min=&price_max=&active=&skip=&limit=
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServiceQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Service>>, AppError> {
    let db = state.db();
    Ok(Json(catalog::search_services(&db, &query, &page)?))
}

// GET /services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Service>, AppError> {
    let db = state.db();
    Ok(Json(catalog::get_service(&db, id)?))
}

// POST /services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(req): Json<NewService>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let db = state.db();
    let service = catalog::create_service(&db, &admin.principal(), &req)?;
    Ok((StatusCode::CREATED, Json(service)))
}

// PATCH /services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ServicePatch>,
) -> Result<Json<Service>, AppError> {
    let db = state.db();
    Ok(Json(catalog::update_service(
        &db,
        &admin.principal(),
        id,
        &patch,
    )?))
}

// DELETE /services/:id
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let db = state.db();
    catalog::delete_service(&db, &admin.principal(), id)?;
    Ok(StatusCode::NO_CONTENT)
}
