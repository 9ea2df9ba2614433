//! Attendance records. `(session_id, student_id)` is unique in storage, and
//! that constraint is the only thing that keeps racing check-ins to one row.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{AppError, UNIQUE_VIOLATION};
use crate::models::attendance::AttendanceRecord;
use crate::types::{SessionId, UserId};

const SELECT_COLUMNS: &str =
    "id, session_id, class_id, student_id, recorded_at, method, status, verification_score";

#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(AttendanceRecord),
    /// The unique key already existed; nothing was written.
    Duplicate,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttendanceRepositoryTrait: Send + Sync {
    async fn find_by_session_and_student(
        &self,
        session_id: SessionId,
        student_id: UserId,
    ) -> Result<Option<AttendanceRecord>, AppError>;

    /// Inserts unless a record for the same session and student exists.
    async fn insert_unique(&self, record: &AttendanceRecord) -> Result<InsertOutcome, AppError>;

    async fn list_for_session(&self, session_id: SessionId)
        -> Result<Vec<AttendanceRecord>, AppError>;

    async fn list_for_student(&self, student_id: UserId)
        -> Result<Vec<AttendanceRecord>, AppError>;
}

#[derive(Debug, Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceRepositoryTrait for AttendanceRepository {
    async fn find_by_session_and_student(
        &self,
        session_id: SessionId,
        student_id: UserId,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE session_id = $1 AND student_id = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(session_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_unique(&self, record: &AttendanceRecord) -> Result<InsertOutcome, AppError> {
        let query = format!(
            "INSERT INTO attendance_records \
             (id, session_id, class_id, student_id, recorded_at, method, status, verification_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (session_id, student_id) DO NOTHING \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let result = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(record.id)
            .bind(record.session_id)
            .bind(record.class_id)
            .bind(record.student_id)
            .bind(record.recorded_at)
            .bind(record.method.db_value())
            .bind(record.status.db_value())
            .bind(record.verification_score)
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(Some(row)) => Ok(InsertOutcome::Inserted(row)),
            Ok(None) => Ok(InsertOutcome::Duplicate),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Ok(InsertOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE session_id = $1 ORDER BY recorded_at, id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_for_student(
        &self,
        student_id: UserId,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE student_id = $1 ORDER BY recorded_at DESC, id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
