pub mod auth;
pub mod bookings;
pub mod classes;
pub mod health;
