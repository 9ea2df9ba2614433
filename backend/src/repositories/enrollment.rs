use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::types::{ClassId, UserId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentRepositoryTrait: Send + Sync {
    async fn is_enrolled(&self, class_id: ClassId, student_id: UserId) -> Result<bool, AppError>;
}

#[derive(Debug, Clone)]
pub struct EnrollmentRepository {
    pool: PgPool,
}

impl EnrollmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentRepositoryTrait for EnrollmentRepository {
    async fn is_enrolled(&self, class_id: ClassId, student_id: UserId) -> Result<bool, AppError> {
        let enrolled = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE class_id = $1 AND student_id = $2)",
        )
        .bind(class_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrolled)
    }
}
