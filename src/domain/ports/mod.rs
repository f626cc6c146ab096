use crate::domain::models::{
    fitness_class::{ClassChanges, FitnessClass},
    booking::Booking,
    user::{Requester, User},
    auth::RefreshTokenRecord,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of "now". Injected everywhere a rule compares against the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn create(&self, class: &FitnessClass) -> Result<FitnessClass, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<FitnessClass>, AppError>;
    async fn list_upcoming(&self, after: DateTime<Utc>, category: Option<&str>) -> Result<Vec<FitnessClass>, AppError>;
    /// Applies `changes` while holding the class row, reconciling
    /// `available_slots` against the live booking count when capacity changes.
    async fn update(&self, id: &str, changes: &ClassChanges) -> Result<FitnessClass, AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Locks the class row, runs the admission checks against `now`, then
    /// decrements the counter and inserts the booking in one transaction.
    async fn reserve(&self, booking: &Booking, now: DateTime<Utc>) -> Result<Booking, AppError>;
    /// Deletes the booking and re-derives the class counter in one transaction.
    /// Fails without side effects when `requester` may not cancel it.
    async fn release(&self, booking_id: &str, requester: &Requester) -> Result<Booking, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError>;
    async fn list_by_client(&self, client_email: &str) -> Result<Vec<Booking>, AppError>;
    async fn list_by_class(&self, class_id: &str) -> Result<Vec<Booking>, AppError>;
    async fn count_by_class(&self, class_id: &str) -> Result<i64, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User, AppError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;
}

/// Refresh tokens are stored only as SHA-256 hashes.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError>;
    /// Deletes and returns the token in one statement, so two concurrent
    /// redemptions of the same token cannot both succeed.
    async fn consume(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError>;
    /// Returns the number of tokens revoked.
    async fn revoke_family(&self, family_id: &str) -> Result<u64, AppError>;
}
