//! Who may do what to a booking or to the service catalog.
//!
//! `decide` is the whole permission matrix. Owner permissions that depend on
//! the booking's state come back as [`Decision::AllowIf`] with the [`Gate`]
//! the caller still has to pass; the lifecycle code applies it once the
//! booking is loaded.

use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{Booking, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateBooking,
    ReadBooking,
    RescheduleBooking,
    CancelBooking,
    /// Moving a booking to `pending`, `confirmed` or `completed`.
    SetBookingStatus,
    DeleteBooking,
    ManageCatalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Booking is still pending or confirmed.
    Reschedulable,
    /// Booking is still pending or confirmed.
    Cancellable,
    /// Booking has not started yet.
    NotStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    AllowIf(Gate),
    Deny,
}

pub fn decide(role: Role, op: Operation, is_owner: bool) -> Decision {
    use Decision::*;
    use Operation::*;

    match role {
        Role::Admin => Allow,
        Role::User => match (op, is_owner) {
            (_, false) => Deny,
            (CreateBooking | ReadBooking, true) => Allow,
            (RescheduleBooking, true) => AllowIf(Gate::Reschedulable),
            (CancelBooking, true) => AllowIf(Gate::Cancellable),
            (DeleteBooking, true) => AllowIf(Gate::NotStarted),
            (SetBookingStatus | ManageCatalog, true) => Deny,
        },
    }
}

impl Gate {
    pub fn check(&self, booking: &Booking, now: DateTime<Utc>) -> Result<(), AppError> {
        match self {
            Gate::Reschedulable if booking.status.is_terminal() => Err(AppError::invalid(
                "cannot reschedule completed or cancelled booking",
            )),
            Gate::Cancellable if booking.status.is_terminal() => Err(AppError::forbidden(
                "users can only cancel pending or confirmed bookings",
            )),
            Gate::NotStarted if booking.start_time <= now => Err(AppError::invalid(
                "cannot delete booking after start time",
            )),
            _ => Ok(()),
        }
    }
}

/// Resolve a decision against a loaded booking, mapping `Deny` to `denied`.
pub fn enforce(
    decision: Decision,
    booking: &Booking,
    now: DateTime<Utc>,
    denied: impl FnOnce() -> AppError,
) -> Result<(), AppError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::AllowIf(gate) => gate.check(booking, now),
        Decision::Deny => Err(denied()),
    }
}

/// Catalog writes are admin-only.
pub fn require_catalog_admin(role: Role) -> Result<(), AppError> {
    match decide(role, Operation::ManageCatalog, false) {
        Decision::Allow => Ok(()),
        Decision::AllowIf(_) | Decision::Deny => Err(AppError::forbidden("admin access required")),
    }
}
