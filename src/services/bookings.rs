use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingFilter, BookingPatch, BookingStatus, NewBooking, Pagination, Principal,
};
use crate::services::authz::{self, Decision, Operation};
use crate::services::scheduling;

/// Create a pending booking for `principal`.
///
/// An inverted interval is rejected up front. The remaining checks run in a
/// fixed order and the first failure wins: service exists, service is active,
/// no overlap, start is in the future. The conflict check and the insert share
/// one immediate transaction.
pub fn create_booking(
    conn: &mut Connection,
    principal: &Principal,
    req: &NewBooking,
) -> Result<Booking, AppError> {
    let now = Utc::now();
    if decide(principal, Operation::CreateBooking, true) == Decision::Deny {
        return Err(AppError::forbidden("not authorized to create bookings"));
    }
    let start = stored_precision(req.start_time)?;
    let end = stored_precision(req.end_time)?;
    check_interval(&start, &end)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let service = queries::get_service(&tx, req.service_id)?
        .ok_or_else(|| AppError::not_found("service not found"))?;
    if !service.is_active {
        return Err(AppError::invalid("service is not active"));
    }

    if scheduling::has_conflict(&tx, service.id, &start, &end, None)? {
        tracing::info!(
            service_id = %service.id,
            start = %start,
            end = %end,
            "booking rejected: slot taken"
        );
        return Err(AppError::conflict("booking conflicts with existing booking"));
    }
    if start <= now {
        return Err(AppError::invalid("cannot book in the past"));
    }

    let booking = Booking {
        id: Uuid::new_v4(),
        user_id: principal.id,
        service_id: service.id,
        start_time: start,
        end_time: end,
        status: BookingStatus::Pending,
        created_at: now,
    };
    queries::insert_booking(&tx, &booking)?;
    let booking = load(&tx, booking.id)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        user_id = %booking.user_id,
        service_id = %booking.service_id,
        start = %booking.start_time,
        "booking created"
    );
    Ok(booking)
}

pub fn get_booking(
    conn: &Connection,
    principal: &Principal,
    id: Uuid,
) -> Result<Booking, AppError> {
    let booking = load(conn, id)?;
    let decision = decide(principal, Operation::ReadBooking, booking.is_owned_by(principal.id));
    authz::enforce(decision, &booking, Utc::now(), || {
        AppError::forbidden("not authorized to view this booking")
    })?;
    Ok(booking)
}

/// Admins see every booking; everyone else only their own, with the same
/// filters applied after that scoping.
pub fn list_bookings(
    conn: &Connection,
    principal: &Principal,
    mut filter: BookingFilter,
    page: &Pagination,
) -> Result<Vec<Booking>, AppError> {
    if !principal.is_admin() {
        filter.user_id = Some(principal.id);
    }
    if let (Some(from), Some(to)) = (&filter.from, &filter.to) {
        if to <= from {
            return Err(AppError::invalid("to date must be after from date"));
        }
    }
    Ok(queries::list_bookings(conn, &filter, page)?)
}

/// Apply a sparse patch. Rescheduling and status changes are checked
/// independently; both run when the patch carries both kinds of field.
pub fn update_booking(
    conn: &mut Connection,
    principal: &Principal,
    id: Uuid,
    patch: &BookingPatch,
) -> Result<Booking, AppError> {
    let now = Utc::now();
    let patch_start = patch.start_time.map(stored_precision).transpose()?;
    let patch_end = patch.end_time.map(stored_precision).transpose()?;
    if let (Some(start), Some(end)) = (&patch_start, &patch_end) {
        check_interval(start, end)?;
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut booking = load(&tx, id)?;
    let is_owner = booking.is_owned_by(principal.id);
    // modifying a booking requires at least being able to see it
    authz::enforce(
        decide(principal, Operation::ReadBooking, is_owner),
        &booking,
        now,
        || AppError::forbidden("not authorized to update this booking"),
    )?;

    if patch.touches_schedule() {
        let start = patch_start.unwrap_or(booking.start_time);
        let end = patch_end.unwrap_or(booking.end_time);

        authz::enforce(
            decide(principal, Operation::RescheduleBooking, is_owner),
            &booking,
            now,
            || AppError::forbidden("not authorized to update this booking"),
        )?;
        check_interval(&start, &end)?;
        if scheduling::has_conflict(&tx, booking.service_id, &start, &end, Some(booking.id))? {
            return Err(AppError::conflict(
                "updated booking conflicts with existing booking",
            ));
        }
        if start <= now {
            return Err(AppError::invalid("cannot reschedule to past time"));
        }

        booking.start_time = start;
        booking.end_time = end;
    }

    if let Some(status) = patch.status {
        let op = match status {
            BookingStatus::Cancelled => Operation::CancelBooking,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Completed => {
                Operation::SetBookingStatus
            }
        };
        authz::enforce(decide(principal, op, is_owner), &booking, now, || {
            AppError::forbidden("users can only cancel pending or confirmed bookings")
        })?;

        if status != booking.status {
            tracing::info!(
                booking_id = %booking.id,
                from = %booking.status,
                to = %status,
                by = %principal.id,
                "booking status changed"
            );
        }
        booking.status = status;
    }

    if !queries::update_booking(&tx, &booking)? {
        return Err(AppError::not_found("booking not found"));
    }
    let booking = load(&tx, booking.id)?;
    tx.commit()?;

    if patch.touches_schedule() {
        tracing::info!(
            booking_id = %booking.id,
            start = %booking.start_time,
            end = %booking.end_time,
            "booking rescheduled"
        );
    }
    Ok(booking)
}

pub fn delete_booking(
    conn: &mut Connection,
    principal: &Principal,
    id: Uuid,
) -> Result<(), AppError> {
    let now = Utc::now();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = load(&tx, id)?;
    let decision = decide(principal, Operation::DeleteBooking, booking.is_owned_by(principal.id));
    authz::enforce(decision, &booking, now, || {
        AppError::forbidden("not authorized to delete this booking")
    })?;

    queries::delete_booking(&tx, booking.id)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, by = %principal.id, "booking deleted");
    Ok(())
}

fn load(conn: &Connection, id: Uuid) -> Result<Booking, AppError> {
    queries::get_booking(conn, id)?.ok_or_else(|| AppError::not_found("booking not found"))
}

fn decide(principal: &Principal, op: Operation, is_owner: bool) -> Decision {
    authz::decide(principal.role, op, is_owner)
}

/// Times are kept to the microsecond; checks run on the value that is stored.
fn stored_precision(dt: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    dt.duration_trunc(TimeDelta::microseconds(1))
        .map_err(|e| AppError::invalid(format!("invalid timestamp {dt}: {e}")))
}

fn check_interval(start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<(), AppError> {
    if start >= end {
        return Err(AppError::invalid("start time must be before end time"));
    }
    Ok(())
}
