//! Session lifecycle and attendance listings.

use std::sync::Arc;

use chrono::{Duration, Timelike};
use chrono_tz::Tz;

use crate::error::AppError;
use crate::models::{
    attendance::AttendanceRecord,
    class::Class,
    session::{AttendanceSession, CreateSessionRequest},
    user::User,
};
use crate::repositories::{
    AttendanceRepositoryTrait, Repositories, SessionRepositoryTrait, SessionSecretRepositoryTrait,
};
use crate::types::{ClassId, SessionId};
use crate::utils::time::{local_date_time, Clock};

pub struct SessionService {
    sessions: Arc<dyn SessionRepositoryTrait>,
    secrets: Arc<dyn SessionSecretRepositoryTrait>,
    attendance: Arc<dyn AttendanceRepositoryTrait>,
    clock: Arc<dyn Clock>,
    time_zone: Tz,
    auto_expire: Duration,
}

impl SessionService {
    pub fn new(
        repositories: &Repositories,
        clock: Arc<dyn Clock>,
        time_zone: Tz,
        auto_expire: Duration,
    ) -> Self {
        Self {
            sessions: repositories.sessions.clone(),
            secrets: repositories.secrets.clone(),
            attendance: repositories.attendance.clone(),
            clock,
            time_zone,
            auto_expire,
        }
    }

    /// Opens a session for `class_id`. Date and start time default to "now" in
    /// the configured time zone.
    pub async fn create_session(
        &self,
        caller: &User,
        class_id: ClassId,
        payload: CreateSessionRequest,
    ) -> Result<AttendanceSession, AppError> {
        let class = self.owned_class(caller, class_id).await?;
        let (today, now) = local_date_time(self.clock.now(), &self.time_zone);
        let session = AttendanceSession::new(
            class.id,
            payload.session_date.unwrap_or(today),
            payload
                .start_time
                .unwrap_or_else(|| now.with_nanosecond(0).unwrap_or(now)),
        );
        let created = self.sessions.create_session(&session).await?;
        tracing::info!(
            session_id = %created.id,
            class_id = %created.class_id,
            session_date = %created.session_date,
            start_time = %created.start_time,
            "Attendance session opened"
        );
        Ok(created)
    }

    /// Closes the session and drops its QR secret. Ending an already closed
    /// session is a no-op.
    pub async fn end_session(
        &self,
        caller: &User,
        session_id: SessionId,
    ) -> Result<AttendanceSession, AppError> {
        let session = self.find_session(session_id).await?;
        self.owned_class(caller, session.class_id).await?;

        let changed = self.sessions.end_session(session_id).await?;
        self.secrets.clear(session_id).await?;
        if changed {
            tracing::info!(%session_id, "Attendance session ended");
        }
        Ok(AttendanceSession {
            is_active: false,
            ..session
        })
    }

    pub async fn list_session_attendance(
        &self,
        caller: &User,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let session = self.find_session(session_id).await?;
        if !caller.is_admin() {
            self.owned_class(caller, session.class_id).await?;
        }
        self.attendance.list_for_session(session_id).await
    }

    pub async fn my_attendance(&self, caller: &User) -> Result<Vec<AttendanceRecord>, AppError> {
        self.attendance.list_for_student(caller.id).await
    }

    /// Persists `is_active = false` for every session past its implicit expiry.
    pub async fn expire_elapsed(&self) -> Result<u64, AppError> {
        let hours = i32::try_from(self.auto_expire.num_hours()).unwrap_or(i32::MAX);
        self.sessions
            .expire_elapsed_sessions(self.clock.now(), self.time_zone, hours)
            .await
    }

    async fn find_session(&self, session_id: SessionId) -> Result<AttendanceSession, AppError> {
        self.sessions
            .find_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance session not found".into()))
    }

    async fn owned_class(&self, caller: &User, class_id: ClassId) -> Result<Class, AppError> {
        let class = self
            .sessions
            .find_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Class not found".into()))?;
        if !class.is_owned_by(caller.id) {
            return Err(AppError::Forbidden(
                "Only the professor who owns this class can manage its sessions".into(),
            ));
        }
        Ok(class)
    }
}
