//! Current QR secret per session. One row per session; issuing replaces it.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::session_token::CurrentSessionSecret;
use crate::types::SessionId;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionSecretRepositoryTrait: Send + Sync {
    /// Atomically overwrites whatever secret the session held.
    async fn replace_current(&self, secret: &CurrentSessionSecret) -> Result<(), AppError>;

    async fn current(&self, session_id: SessionId)
        -> Result<Option<CurrentSessionSecret>, AppError>;

    async fn clear(&self, session_id: SessionId) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct SessionSecretRepository {
    pool: PgPool,
}

impl SessionSecretRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionSecretRepositoryTrait for SessionSecretRepository {
    async fn replace_current(&self, secret: &CurrentSessionSecret) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO session_tokens (session_id, secret, issued_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id) DO UPDATE
            SET secret = EXCLUDED.secret,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(secret.session_id)
        .bind(&secret.secret)
        .bind(secret.issued_at)
        .bind(secret.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn current(
        &self,
        session_id: SessionId,
    ) -> Result<Option<CurrentSessionSecret>, AppError> {
        let row = sqlx::query_as::<_, CurrentSessionSecret>(
            "SELECT session_id, secret, issued_at, expires_at FROM session_tokens WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn clear(&self, session_id: SessionId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM session_tokens WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
