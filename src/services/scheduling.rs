use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;

/// Half-open intervals `[a_start, a_end)` and `[b_start, b_end)` intersect.
/// Touching at a boundary is not an overlap.
pub fn overlaps(
    a_start: &DateTime<Utc>,
    a_end: &DateTime<Utc>,
    b_start: &DateTime<Utc>,
    b_end: &DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whether any pending or confirmed booking on `service_id` other than
/// `exclude` overlaps `[start, end)`.
///
/// Callers that act on the answer must hold the connection inside the same
/// write transaction as the insert or update that follows.
pub fn has_conflict(
    conn: &Connection,
    service_id: Uuid,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Result<bool, AppError> {
    let bookings = queries::get_timeline_bookings(conn, service_id, end)?;

    Ok(bookings
        .iter()
        .filter(|b| Some(b.id) != exclude)
        .filter(|b| b.status.occupies_timeline())
        .any(|b| overlaps(&b.start_time, &b.end_time, start, end)))
}
