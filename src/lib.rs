pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/users/me",
            get(handlers::users::me).patch(handlers::users::update_me),
        )
        .route("/users/email/:email", get(handlers::users::get_user_by_email))
        .route("/users/:id", get(handlers::users::get_user))
        .route(
            "/services",
            get(handlers::catalog::list_services).post(handlers::catalog::create_service),
        )
        .route(
            "/services/:id",
            get(handlers::catalog::get_service)
                .patch(handlers::catalog::update_service)
                .delete(handlers::catalog::delete_service),
        )
        .route(
            "/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route(
            "/bookings/:id",
            get(handlers::bookings::get_booking)
                .patch(handlers::bookings::update_booking)
                .delete(handlers::bookings::delete_booking),
        )
        .route("/reviews", post(handlers::reviews::create_review))
        .route(
            "/reviews/:id",
            get(handlers::reviews::get_review)
                .patch(handlers::reviews::update_review)
                .delete(handlers::reviews::delete_review),
        )
        .route(
            "/reviews/services/:service_id/reviews",
            get(handlers::reviews::service_reviews),
        )
        .route(
            "/reviews/services/:service_id/stats",
            get(handlers::reviews::service_stats),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
