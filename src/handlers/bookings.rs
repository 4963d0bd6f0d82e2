use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::extract::CurrentUser;
use crate::models::{Booking, BookingFilter, BookingPatch, BookingStatus, NewBooking, Pagination};
use crate::services::bookings;
use crate::state::AppState;

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let mut db = state.db();
    let booking = bookings::create_booking(&mut db, &current.principal(), &req)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /bookings?status=&from=&to=&skip=&limit=
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl BookingsQuery {
    fn into_filter(self) -> Result<BookingFilter, AppError> {
        let status = self
            .status
            .map(|s| s.parse::<BookingStatus>())
            .transpose()
            .map_err(|e| AppError::invalid(e.to_string()))?;
        Ok(BookingFilter {
            user_id: None,
            status,
            from: parse_datetime("from", self.from)?,
            to: parse_datetime("to", self.to)?,
        })
    }
}

fn parse_datetime(field: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| AppError::invalid(format!("invalid {field} datetime: {s}")))
    })
    .transpose()
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<BookingsQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let filter = query.into_filter()?;
    let db = state.db();
    let bookings = bookings::list_bookings(&db, &current.principal(), filter, &page)?;
    Ok(Json(bookings))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db();
    Ok(Json(bookings::get_booking(&db, &current.principal(), id)?))
}

// PATCH /bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<BookingPatch>,
) -> Result<Json<Booking>, AppError> {
    let mut db = state.db();
    let booking = bookings::update_booking(&mut db, &current.principal(), id, &patch)?;
    Ok(Json(booking))
}

// DELETE /bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut db = state.db();
    bookings::delete_booking(&mut db, &current.principal(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(status: Option<&str>, from: Option<&str>, to: Option<&str>) -> BookingsQuery {
        BookingsQuery {
            status: status.map(String::from),
            from: from.map(String::from),
            to: to.map(String::from),
        }
    }

    #[test]
    fn test_query_parses_into_filter() {
        let filter = query(
            Some("confirmed"),
            Some("2030-01-01T09:00:00Z"),
            Some("2030-01-01T12:00:00+02:00"),
        )
        .into_filter()
        .unwrap();
        assert_eq!(filter.status, Some(BookingStatus::Confirmed));
        assert_eq!(
            filter.to.unwrap().to_rfc3339(),
            "2030-01-01T10:00:00+00:00"
        );
        assert!(filter.user_id.is_none());
    }

    #[test]
    fn test_bad_query_values_are_invalid() {
        for q in [
            query(Some("booked"), None, None),
            query(None, Some("yesterday"), None),
            query(None, None, Some("2030-01-01")),
        ] {
            assert!(matches!(q.into_filter(), Err(AppError::InvalidRequest(_))));
        }
    }
}
