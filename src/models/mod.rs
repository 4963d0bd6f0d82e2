pub mod booking;
pub mod review;
pub mod service;
pub mod user;

pub use booking::{Booking, BookingFilter, BookingPatch, BookingStatus, NewBooking};
pub use review::{NewReview, Review, ReviewPatch, ReviewStats};
pub use service::{NewService, Service, ServicePatch, ServiceQuery};
pub use user::{Credentials, NewUser, Principal, Role, User, UserPatch};

use serde::Deserialize;

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
        }
    }

    pub fn offset(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Requested page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}
