use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{NewService, Pagination, Principal, Service, ServicePatch, ServiceQuery};
use crate::services::authz;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_DURATION_MINUTES: i32 = 480;

/// 1,000,000.00
fn max_price() -> Decimal {
    Decimal::new(100_000_000, 2)
}

fn validate_text(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 || value.chars().count() > max {
        return Err(AppError::invalid(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(())
}

fn validate_price(price: &Decimal) -> Result<(), AppError> {
    if price <= &Decimal::ZERO {
        return Err(AppError::invalid("price must be greater than 0"));
    }
    if price > &max_price() {
        return Err(AppError::invalid(format!("price must not exceed {}", max_price())));
    }
    if price.normalize().scale() > 2 {
        return Err(AppError::invalid("price must have at most 2 decimal places"));
    }
    Ok(())
}

fn validate_duration(minutes: i32) -> Result<(), AppError> {
    if !(1..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(AppError::invalid(format!(
            "duration must be between 1 and {MAX_DURATION_MINUTES} minutes"
        )));
    }
    Ok(())
}

fn validate(service: &Service) -> Result<(), AppError> {
    validate_text("title", &service.title, MAX_TITLE_LEN)?;
    validate_text("description", &service.description, MAX_DESCRIPTION_LEN)?;
    validate_price(&service.price)?;
    validate_duration(service.duration_minutes)
}

pub fn create_service(
    conn: &Connection,
    principal: &Principal,
    req: &NewService,
) -> Result<Service, AppError> {
    authz::require_catalog_admin(principal.role)?;

    let service = Service {
        id: Uuid::new_v4(),
        title: req.title.clone(),
        description: req.description.clone(),
        price: req.price,
        duration_minutes: req.duration_minutes,
        is_active: req.is_active,
        created_at: Utc::now(),
    };
    validate(&service)?;
    queries::insert_service(conn, &service)?;

    tracing::info!(service_id = %service.id, title = %service.title, "service created");
    get_service(conn, service.id)
}

pub fn get_service(conn: &Connection, id: Uuid) -> Result<Service, AppError> {
    queries::get_service(conn, id)?.ok_or_else(|| AppError::not_found("service not found"))
}

pub fn search_services(
    conn: &Connection,
    query: &ServiceQuery,
    page: &Pagination,
) -> Result<Vec<Service>, AppError> {
    for bound in [&query.price_min, &query.price_max].into_iter().flatten() {
        if bound < &Decimal::ZERO || bound > &max_price() {
            return Err(AppError::invalid(format!(
                "price filters must be between 0 and {}",
                max_price()
            )));
        }
    }
    Ok(queries::search_services(conn, query, page)?)
}

/// Deactivating a service leaves its existing bookings alone; it only
/// blocks new ones.
pub fn update_service(
    conn: &Connection,
    principal: &Principal,
    id: Uuid,
    patch: &ServicePatch,
) -> Result<Service, AppError> {
    authz::require_catalog_admin(principal.role)?;

    let mut service = get_service(conn, id)?;
    if let Some(title) = &patch.title {
        service.title = title.clone();
    }
    if let Some(description) = &patch.description {
        service.description = description.clone();
    }
    if let Some(price) = patch.price {
        service.price = price;
    }
    if let Some(minutes) = patch.duration_minutes {
        service.duration_minutes = minutes;
    }
    if let Some(active) = patch.is_active {
        service.is_active = active;
    }
    validate(&service)?;

    if !queries::update_service(conn, &service)? {
        return Err(AppError::not_found("service not found"));
    }
    tracing::info!(service_id = %service.id, active = service.is_active, "service updated");
    get_service(conn, id)
}

/// Removes the service together with its bookings and their reviews.
pub fn delete_service(conn: &Connection, principal: &Principal, id: Uuid) -> Result<(), AppError> {
    authz::require_catalog_admin(principal.role)?;

    if !queries::delete_service(conn, id)? {
        return Err(AppError::not_found("service not found"));
    }
    tracing::info!(service_id = %id, "service deleted");
    Ok(())
}
