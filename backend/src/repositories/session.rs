//! Classes and their attendance sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{class::Class, session::AttendanceSession};
use crate::types::{ClassId, SessionId};

const SESSION_COLUMNS: &str = "id, class_id, session_date, start_time, is_active, created_at";
const CLASS_COLUMNS: &str = "id, professor_id, name, room, geofence_latitude, geofence_longitude, \
     geofence_radius_meters, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepositoryTrait: Send + Sync {
    async fn find_session(&self, id: SessionId) -> Result<Option<AttendanceSession>, AppError>;

    async fn find_class(&self, id: ClassId) -> Result<Option<Class>, AppError>;

    async fn create_session(
        &self,
        session: &AttendanceSession,
    ) -> Result<AttendanceSession, AppError>;

    /// Marks the session inactive. Returns whether a row changed.
    async fn end_session(&self, id: SessionId) -> Result<bool, AppError>;

    /// Persists implicit expiry for active sessions whose start (in `tz`) is at
    /// least `auto_expire_hours` before `now`.
    async fn expire_elapsed_sessions(
        &self,
        now: DateTime<Utc>,
        tz: Tz,
        auto_expire_hours: i32,
    ) -> Result<u64, AppError>;
}

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepositoryTrait for SessionRepository {
    async fn find_session(&self, id: SessionId) -> Result<Option<AttendanceSession>, AppError> {
        let query = format!(
            "SELECT {} FROM attendance_sessions WHERE id = $1",
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<_, AttendanceSession>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_class(&self, id: ClassId) -> Result<Option<Class>, AppError> {
        let query = format!("SELECT {} FROM classes WHERE id = $1", CLASS_COLUMNS);
        let row = sqlx::query_as::<_, Class>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_session(
        &self,
        session: &AttendanceSession,
    ) -> Result<AttendanceSession, AppError> {
        let query = format!(
            "INSERT INTO attendance_sessions (id, class_id, session_date, start_time, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {}",
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<_, AttendanceSession>(&query)
            .bind(session.id)
            .bind(session.class_id)
            .bind(session.session_date)
            .bind(session.start_time)
            .bind(session.is_active)
            .bind(session.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn end_session(&self, id: SessionId) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE attendance_sessions SET is_active = FALSE WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_elapsed_sessions(
        &self,
        now: DateTime<Utc>,
        tz: Tz,
        auto_expire_hours: i32,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_sessions
            SET is_active = FALSE
            WHERE is_active
              AND ((session_date + start_time) AT TIME ZONE $1) + make_interval(hours => $2) <= $3
            "#,
        )
        .bind(tz.name())
        .bind(auto_expire_hours)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
