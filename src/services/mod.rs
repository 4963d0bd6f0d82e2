pub mod accounts;
pub mod auth;
pub mod authz;
pub mod bookings;
pub mod catalog;
pub mod reviews;
pub mod scheduling;
