use crate::domain::{models::{booking::Booking, user::Requester}, ports::BookingRepository};
use crate::domain::services::admission::{admit, authorize_cancellation};
use crate::error::{is_unique_violation, tx_error, AppError};
use crate::infra::repositories::sqlite_class_repo::lock_class_row;
use async_trait::async_trait;
use sqlx::SqlitePool;
use chrono::{DateTime, Utc};

pub struct SqliteBookingRepo {
    pool: SqlitePool,
}

impl SqliteBookingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepo {
    async fn reserve(&self, booking: &Booking, now: DateTime<Utc>) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;

        let class = lock_class_row(&mut tx, &booking.class_id).await?
            .ok_or_else(AppError::class_not_found)?;

        let already_booked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE class_id = ? AND client_email = ?)"
        )
            .bind(&booking.class_id)
            .bind(&booking.client_email)
            .fetch_one(&mut *tx)
            .await
            .map_err(tx_error)?;

        admit(&class, booking.booking_time, now, already_booked)?;

        let result = sqlx::query(
            "UPDATE fitness_classes SET available_slots = available_slots - 1 WHERE id = ? AND available_slots > 0"
        )
            .bind(&booking.class_id)
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NoSlots);
        }

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, class_id, client_name, client_email, booking_time, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *"
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

        // Write first so the transaction holds the database lock before it reads.
        let booking = sqlx::query_as::<_, Booking>("DELETE FROM bookings WHERE id = ? RETURNING *")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(tx_error)?
            .ok_or_else(AppError::booking_not_found)?;

        authorize_cancellation(&booking, requester)?;

        sqlx::query(
            "UPDATE fitness_classes
             SET available_slots = MAX(0, total_capacity - (SELECT COUNT(*) FROM bookings WHERE class_id = ?))
             WHERE id = ?"
        )
            .bind(&booking.class_id)
            .bind(&booking.class_id)
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;

        tx.commit().await.map_err(tx_error)?;
        Ok(booking)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn list_by_client(&self, client_email: &str) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(
            "SELECT b.* FROM bookings b JOIN fitness_classes c ON c.id = b.class_id WHERE b.client_email = ? ORDER BY c.start_time ASC"
        ).bind(client_email).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn list_by_class(&self, class_id: &str) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE class_id = ? ORDER BY booking_time ASC").bind(class_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn count_by_class(&self, class_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE class_id = ?").bind(class_id).fetch_one(&self.pool).await.map_err(AppError::Database)
    }
}
