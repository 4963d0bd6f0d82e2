pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod extract;
pub mod health;
pub mod reviews;
pub mod users;
