pub mod auth;
pub mod booking;
pub mod fitness_class;
pub mod user;
