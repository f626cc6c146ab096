use crate::domain::{models::{booking::Booking, user::Requester}, ports::BookingRepository};
use crate::domain::services::admission::{admit, authorize_cancellation};
use crate::error::{is_unique_violation, tx_error, AppError};
use crate::infra::repositories::postgres_class_repo::{lock_class_row, set_lock_timeout};
use async_trait::async_trait;
use sqlx::PgPool;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub struct PostgresBookingRepo {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresBookingRepo {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepo {
    async fn reserve(&self, booking: &Booking, now: DateTime<Utc>) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        set_lock_timeout(&mut tx, self.lock_timeout).await?;

        let class = lock_class_row(&mut tx, &booking.class_id).await?
            .ok_or_else(AppError::class_not_found)?;

        let already_booked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE class_id = $1 AND client_email = $2)"
        )
            .bind(&booking.class_id)
            .bind(&booking.client_email)
            .fetch_one(&mut *tx)
            .await
            .map_err(tx_error)?;

        admit(&class, booking.booking_time, now, already_booked)?;

        sqlx::query("UPDATE fitness_classes SET available_slots = available_slots - 1 WHERE id = $1")
            .bind(&booking.class_id)
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, class_id, client_name, client_email, booking_time, created_at) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *"
        )
            .bind(&booking.id).bind(&booking.class_id).bind(&booking.client_name)
            .bind(&booking.client_email).bind(booking.booking_time).bind(booking.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| if is_unique_violation(&e) { AppError::DuplicateBooking } else { tx_error(e) })?;

        tx.commit().await.map_err(tx_error)?;
        Ok(created)
    }

    async fn release(&self, booking_id: &str, requester: &Requester) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        set_lock_timeout(&mut tx, self.lock_timeout).await?;

        // Class row first, same order as `reserve`, so the two never deadlock.
        let class_id: String = sqlx::query_scalar("SELECT class_id FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(tx_error)?
            .ok_or_else(AppError::booking_not_found)?;

        lock_class_row(&mut tx, &class_id).await?
            .ok_or_else(AppError::booking_not_found)?;

        let booking = sqlx::query_as::<_, Booking>("DELETE FROM bookings WHERE id = $1 RETURNING *")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(tx_error)?
            .ok_or_else(AppError::booking_not_found)?;

        authorize_cancellation(&booking, requester)?;

        sqlx::query(
            "UPDATE fitness_classes
             SET available_slots = GREATEST(0, total_capacity - (SELECT COUNT(*) FROM bookings WHERE class_id = $1))
             WHERE id = $1"
        )
            .bind(&class_id)
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;

        tx.commit().await.map_err(tx_error)?;
        Ok(booking)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn list_by_client(&self, client_email: &str) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(
            "SELECT b.* FROM bookings b JOIN fitness_classes c ON c.id = b.class_id WHERE b.client_email = $1 ORDER BY c.start_time ASC"
        ).bind(client_email).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn list_by_class(&self, class_id: &str) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE class_id = $1 ORDER BY booking_time ASC").bind(class_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn count_by_class(&self, class_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE class_id = $1").bind(class_id).fetch_one(&self.pool).await.map_err(AppError::Database)
    }
}
