pub mod admission;
pub mod auth_service;
pub mod class_catalog;
pub mod reservation_ledger;
