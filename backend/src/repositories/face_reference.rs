use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::types::UserId;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceReferenceRepositoryTrait: Send + Sync {
    /// Stored reference features for the student, as handed to the oracle.
    async fn find_reference(&self, student_id: UserId) -> Result<Option<String>, AppError>;
}

#[derive(Debug, Clone)]
pub struct FaceReferenceRepository {
    pool: PgPool,
}

impl FaceReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FaceReferenceRepositoryTrait for FaceReferenceRepository {
    async fn find_reference(&self, student_id: UserId) -> Result<Option<String>, AppError> {
        let features = sqlx::query_scalar::<_, String>(
            "SELECT reference_features FROM face_references WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(features)
    }
}
