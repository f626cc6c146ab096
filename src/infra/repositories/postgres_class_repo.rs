use crate::domain::{models::fitness_class::{ClassChanges, FitnessClass}, ports::ClassRepository};
use crate::domain::services::admission::{check_reschedule, reconcile_available};
use crate::error::{tx_error, AppError};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub struct PostgresClassRepo {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresClassRepo {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

/// Bounds every lock wait in the current transaction. Expiry raises 55P03,
/// which `tx_error` turns into a retryable conflict.
pub(crate) async fn set_lock_timeout(conn: &mut PgConnection, timeout: Duration) -> Result<(), AppError> {
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", timeout.as_millis()))
        .execute(&mut *conn)
        .await
        .map_err(tx_error)?;
    Ok(())
}

pub(crate) async fn lock_class_row(conn: &mut PgConnection, id: &str) -> Result<Option<FitnessClass>, AppError> {
    sqlx::query_as::<_, FitnessClass>("SELECT * FROM fitness_classes WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(tx_error)
}

#[async_trait]
impl ClassRepository for PostgresClassRepo {
    async fn create(&self, class: &FitnessClass) -> Result<FitnessClass, AppError> {
        sqlx::query_as::<_, FitnessClass>(
            r#"INSERT INTO fitness_classes (id, category, start_time, instructor, total_capacity, available_slots, duration_min, location, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING *"#
        )
            .bind(&class.id)
            .bind(&class.category)
            .bind(class.start_time)
            .bind(&class.instructor)
            .bind(class.total_capacity)
            .bind(class.available_slots)
            .bind(class.duration_min)
            .bind(&class.location)
            .bind(class.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FitnessClass>, AppError> {
        sqlx::query_as::<_, FitnessClass>("SELECT * FROM fitness_classes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_upcoming(&self, after: DateTime<Utc>, category: Option<&str>) -> Result<Vec<FitnessClass>, AppError> {
        sqlx::query_as::<_, FitnessClass>(
            "SELECT * FROM fitness_classes WHERE start_time > $1 AND ($2::TEXT IS NULL OR category = $2) ORDER BY start_time ASC"
        )
            .bind(after)
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update(&self, id: &str, changes: &ClassChanges) -> Result<FitnessClass, AppError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        set_lock_timeout(&mut tx, self.lock_timeout).await?;

        let mut class = lock_class_row(&mut tx, id).await?
            .ok_or_else(AppError::class_not_found)?;

        if let Some(new_start) = changes.start_time {
            let booking_times: Vec<DateTime<Utc>> =
                sqlx::query_scalar("SELECT booking_time FROM bookings WHERE class_id = $1")
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(tx_error)?;
            check_reschedule(new_start, &booking_times)?;
        }

        changes.apply_descriptive(&mut class);

        if let Some(total) = changes.total_capacity {
            let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE class_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(tx_error)?;
            class.total_capacity = total;
            class.available_slots = reconcile_available(total, active);
        }

        let updated = sqlx::query_as::<_, FitnessClass>(
            r#"UPDATE fitness_classes
               SET category=$1, start_time=$2, instructor=$3, total_capacity=$4, available_slots=$5, duration_min=$6, location=$7
               WHERE id=$8
               RETURNING *"#
        )
            .bind(&class.category)
            .bind(class.start_time)
            .bind(&class.instructor)
            .bind(class.total_capacity)
            .bind(class.available_slots)
            .bind(class.duration_min)
            .bind(&class.location)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(tx_error)?;

        tx.commit().await.map_err(tx_error)?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        set_lock_timeout(&mut tx, self.lock_timeout).await?;

        let result = sqlx::query("DELETE FROM fitness_classes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::class_not_found());
        }
        tx.commit().await.map_err(tx_error)?;
        Ok(())
    }
}
