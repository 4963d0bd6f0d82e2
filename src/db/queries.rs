use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Booking, BookingFilter, BookingStatus, Pagination, Review, Role, Service, ServiceQuery, User,
};

/// Fixed-width UTC text, so SQL string order matches time order.
pub fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn cents(price: &Decimal) -> rusqlite::Result<i64> {
    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|c| c.round().to_i64())
        .ok_or_else(|| {
            rusqlite::Error::ToSqlConversionFailure(format!("price out of range: {price}").into())
        })
}

/// `%`, `_` and the escape character itself match literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> rusqlite::Result<Vec<T>> {
    rows.collect()
}

// ── Users ──

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_col(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: parse_col::<Role>(row, 4)?,
        created_at: ts_col(row, 5)?,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash,
            user.role.as_str(),
            ts(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        parse_user_row,
    )
    .optional()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email],
        parse_user_row,
    )
    .optional()
}

pub fn update_user(conn: &Connection, user: &User) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET name = ?1, email = ?2, role = ?3 WHERE id = ?4",
        params![user.name, user.email, user.role.as_str(), user.id.to_string()],
    )?;
    Ok(count > 0)
}

// ── Services ──

const SERVICE_COLUMNS: &str =
    "id, title, description, price_cents, duration_minutes, is_active, created_at";

fn parse_service_row(row: &Row) -> rusqlite::Result<Service> {
    let price_cents: i64 = row.get(3)?;
    Ok(Service {
        id: parse_col(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: Decimal::new(price_cents, 2),
        duration_minutes: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
        created_at: ts_col(row, 6)?,
    })
}

pub fn insert_service(conn: &Connection, service: &Service) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO services (id, title, description, price_cents, duration_minutes, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id.to_string(),
            service.title,
            service.description,
            cents(&service.price)?,
            service.duration_minutes,
            service.is_active as i32,
            ts(&service.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Service>> {
    conn.query_row(
        &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
        params![id.to_string()],
        parse_service_row,
    )
    .optional()
}

pub fn search_services(
    conn: &Connection,
    query: &ServiceQuery,
    page: &Pagination,
) -> rusqlite::Result<Vec<Service>> {
    let mut clauses: Vec<String> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![];

    if let Some(active) = query.active {
        values.push(Box::new(active as i32));
        clauses.push(format!("is_active = ?{}", values.len()));
    }
    if let Some(q) = query.q.as_deref().filter(|q| !q.trim().is_empty()) {
        values.push(Box::new(like_pattern(q.trim())));
        let n = values.len();
        clauses.push(format!(
            "(title LIKE ?{n} ESCAPE '\\' OR description LIKE ?{n} ESCAPE '\\')"
        ));
    }
    if let Some(min) = &query.price_min {
        values.push(Box::new(cents(min)?));
        clauses.push(format!("price_cents >= ?{}", values.len()));
    }
    if let Some(max) = &query.price_max {
        values.push(Box::new(cents(max)?));
        clauses.push(format!("price_cents <= ?{}", values.len()));
    }

    let sql = paged_select(
        &format!("SELECT {SERVICE_COLUMNS} FROM services"),
        &clauses,
        "created_at ASC, id ASC",
        &mut values,
        page,
    );

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(refs.as_slice(), parse_service_row)?;
    collect(rows)
}

pub fn update_service(conn: &Connection, service: &Service) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET title = ?1, description = ?2, price_cents = ?3,
                duration_minutes = ?4, is_active = ?5
         WHERE id = ?6",
        params![
            service.title,
            service.description,
            cents(&service.price)?,
            service.duration_minutes,
            service.is_active as i32,
            service.id.to_string(),
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_service(conn: &Connection, id: Uuid) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM services WHERE id = ?1", params![id.to_string()])?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, service_id, start_time, end_time, status, created_at";

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: parse_col(row, 0)?,
        user_id: parse_col(row, 1)?,
        service_id: parse_col(row, 2)?,
        start_time: ts_col(row, 3)?,
        end_time: ts_col(row, 4)?,
        status: parse_col::<BookingStatus>(row, 5)?,
        created_at: ts_col(row, 6)?,
    })
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, service_id, start_time, end_time, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            booking.id.to_string(),
            booking.user_id.to_string(),
            booking.service_id.to_string(),
            ts(&booking.start_time),
            ts(&booking.end_time),
            booking.status.as_str(),
            ts(&booking.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id.to_string()],
        parse_booking_row,
    )
    .optional()
}

/// Pending/confirmed bookings on a service that start before `before`,
/// the only ones that can possibly reach into a window ending there.
pub fn get_timeline_bookings(
    conn: &Connection,
    service_id: Uuid,
    before: &DateTime<Utc>,
) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE service_id = ?1 AND status IN ('pending', 'confirmed') AND start_time < ?2
         ORDER BY start_time ASC"
    ))?;
    let rows = stmt.query_map(params![service_id.to_string(), ts(before)], parse_booking_row)?;
    collect(rows)
}

pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    page: &Pagination,
) -> rusqlite::Result<Vec<Booking>> {
    let mut clauses: Vec<String> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![];

    if let Some(user_id) = filter.user_id {
        values.push(Box::new(user_id.to_string()));
        clauses.push(format!("user_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(from) = &filter.from {
        values.push(Box::new(ts(from)));
        clauses.push(format!("start_time >= ?{}", values.len()));
    }
    if let Some(to) = &filter.to {
        values.push(Box::new(ts(to)));
        clauses.push(format!("end_time <= ?{}", values.len()));
    }

    let sql = paged_select(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings"),
        &clauses,
        "start_time ASC, id ASC",
        &mut values,
        page,
    );

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(refs.as_slice(), parse_booking_row)?;
    collect(rows)
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET start_time = ?1, end_time = ?2, status = ?3 WHERE id = ?4",
        params![
            ts(&booking.start_time),
            ts(&booking.end_time),
            booking.status.as_str(),
            booking.id.to_string(),
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: Uuid) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id.to_string()])?;
    Ok(count > 0)
}

// ── Reviews ──

const REVIEW_COLUMNS: &str = "r.id, r.booking_id, r.rating, r.comment, r.created_at";

fn parse_review_row(row: &Row) -> rusqlite::Result<Review> {
    Ok(Review {
        id: parse_col(row, 0)?,
        booking_id: parse_col(row, 1)?,
        rating: row.get(2)?,
        comment: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}

pub fn insert_review(conn: &Connection, review: &Review) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, booking_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            review.id.to_string(),
            review.booking_id.to_string(),
            review.rating,
            review.comment,
            ts(&review.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_review(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Review>> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews r WHERE r.id = ?1"),
        params![id.to_string()],
        parse_review_row,
    )
    .optional()
}

pub fn get_review_for_booking(
    conn: &Connection,
    booking_id: Uuid,
) -> rusqlite::Result<Option<Review>> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews r WHERE r.booking_id = ?1"),
        params![booking_id.to_string()],
        parse_review_row,
    )
    .optional()
}

pub fn get_service_reviews(
    conn: &Connection,
    service_id: Uuid,
    page: &Pagination,
) -> rusqlite::Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews r
         INNER JOIN bookings b ON b.id = r.booking_id
         WHERE b.service_id = ?1
         ORDER BY r.created_at ASC, r.id ASC
         LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt.query_map(
        params![service_id.to_string(), page.limit(), page.offset()],
        parse_review_row,
    )?;
    collect(rows)
}

/// Every rating left on bookings of a service, unpaged.
pub fn get_service_ratings(conn: &Connection, service_id: Uuid) -> rusqlite::Result<Vec<i32>> {
    let mut stmt = conn.prepare(
        "SELECT r.rating FROM reviews r
         INNER JOIN bookings b ON b.id = r.booking_id
         WHERE b.service_id = ?1",
    )?;
    let rows = stmt.query_map(params![service_id.to_string()], |row| row.get(0))?;
    collect(rows)
}

pub fn update_review(conn: &Connection, review: &Review) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE reviews SET rating = ?1, comment = ?2 WHERE id = ?3",
        params![review.rating, review.comment, review.id.to_string()],
    )?;
    Ok(count > 0)
}

pub fn delete_review(conn: &Connection, id: Uuid) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM reviews WHERE id = ?1", params![id.to_string()])?;
    Ok(count > 0)
}

// ── Helpers ──

fn paged_select(
    select: &str,
    clauses: &[String],
    order_by: &str,
    values: &mut Vec<Box<dyn ToSql>>,
    page: &Pagination,
) -> String {
    let mut sql = select.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    values.push(Box::new(page.limit()));
    let limit_idx = values.len();
    values.push(Box::new(page.offset()));
    let offset_idx = values.len();
    sql.push_str(&format!(
        " ORDER BY {order_by} LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    ));
    sql
}
