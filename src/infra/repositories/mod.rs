pub mod postgres_booking_repo;
pub mod postgres_class_repo;
pub mod postgres_refresh_token_repo;
pub mod postgres_user_repo;
pub mod sqlite_booking_repo;
pub mod sqlite_class_repo;
pub mod sqlite_refresh_token_repo;
pub mod sqlite_user_repo;

pub(crate) const REFRESH_TOKEN_COLUMNS: &str =
    "token_hash, user_id, family_id, generation_id, expires_at, created_at";
