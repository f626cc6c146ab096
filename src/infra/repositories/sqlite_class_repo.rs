use crate::domain::{models::fitness_class::{ClassChanges, FitnessClass}, ports::ClassRepository};
use crate::domain::services::admission::{check_reschedule, reconcile_available};
use crate::error::{tx_error, AppError};
use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use chrono::{DateTime, Utc};

pub struct SqliteClassRepo {
    pool: SqlitePool,
}

impl SqliteClassRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Takes the database write lock and returns the class row. SQLite has no
/// row locks, so a no-op write must be the first statement of the
/// transaction; a plain read first would let another writer slip in.
pub(crate) async fn lock_class_row(conn: &mut SqliteConnection, id: &str) -> Result<Option<FitnessClass>, AppError> {
    sqlx::query_as::<_, FitnessClass>(
        "UPDATE fitness_classes SET available_slots = available_slots WHERE id = ? RETURNING *"
    )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(tx_error)
}

#[async_trait]
impl ClassRepository for SqliteClassRepo {
    async fn create(&self, class: &FitnessClass) -> Result<FitnessClass, AppError> {
        sqlx::query_as::<_, FitnessClass>(
            r#"INSERT INTO fitness_classes (id, category, start_time, instructor, total_capacity, available_slots, duration_min, location, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        sqlx::query_as::<_, FitnessClass>("SELECT * FROM fitness_classes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_upcoming(&self, after: DateTime<Utc>, category: Option<&str>) -> Result<Vec<FitnessClass>, AppError> {
        sqlx::query_as::<_, FitnessClass>(
            "SELECT * FROM fitness_classes WHERE start_time > ? AND (? IS NULL OR category = ?) ORDER BY start_time ASC"
        )
            .bind(after)
            .bind(category)
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update(&self, id: &str, changes: &ClassChanges) -> Result<FitnessClass, AppError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;

        let mut class = lock_class_row(&mut tx, id).await?
            .ok_or_else(AppError::class_not_found)?;

        if let Some(new_start) = changes.start_time {
            let booking_times: Vec<DateTime<Utc>> =
                sqlx::query_scalar("SELECT booking_time FROM bookings WHERE class_id = ?")
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(tx_error)?;
            check_reschedule(new_start, &booking_times)?;
        }

        changes.apply_descriptive(&mut class);

        if let Some(total) = changes.total_capacity {
            let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE class_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(tx_error)?;
            class.total_capacity = total;
            class.available_slots = reconcile_available(total, active);
        }

        let updated = sqlx::query_as::<_, FitnessClass>(
            r#"UPDATE fitness_classes
               SET category=?, start_time=?, instructor=?, total_capacity=?, available_slots=?, duration_min=?, location=?
               WHERE id=?
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
        let result = sqlx::query("DELETE FROM fitness_classes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(tx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::class_not_found());
        }
        Ok(())
    }
}
