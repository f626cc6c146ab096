use crate::domain::{models::auth::RefreshTokenRecord, ports::RefreshTokenRepository};
use crate::error::AppError;
use crate::infra::repositories::REFRESH_TOKEN_COLUMNS;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteRefreshTokenRepo {
    pool: SqlitePool,
}

impl SqliteRefreshTokenRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for SqliteRefreshTokenRepo {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        let sql = format!("INSERT INTO refresh_tokens ({REFRESH_TOKEN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)");
        sqlx::query(&sql)
            .bind(&record.token_hash)
            .bind(&record.user_id)
            .bind(&record.family_id)
            .bind(record.generation_id)
            .bind(record.expires_at)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let sql = format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = ?");
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn consume(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let sql = format!("DELETE FROM refresh_tokens WHERE token_hash = ? RETURNING {REFRESH_TOKEN_COLUMNS}");
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE family_id = ?")
            .bind(family_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
