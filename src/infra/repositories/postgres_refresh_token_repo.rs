use crate::domain::{models::auth::RefreshTokenRecord, ports::RefreshTokenRepository};
use crate::error::AppError;
use crate::infra::repositories::REFRESH_TOKEN_COLUMNS;
use async_trait::async_trait;
use sqlx::PgPool;

pub struct PostgresRefreshTokenRepo {
    pool: PgPool,
}

impl PostgresRefreshTokenRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PostgresRefreshTokenRepo {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        let sql = format!("INSERT INTO refresh_tokens ({REFRESH_TOKEN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)");
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
        let sql = format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn consume(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let sql = format!("DELETE FROM refresh_tokens WHERE token_hash = $1 RETURNING {REFRESH_TOKEN_COLUMNS}");
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE family_id = $1")
            .bind(family_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
