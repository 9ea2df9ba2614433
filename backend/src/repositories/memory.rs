//! Process-local store implementing every repository trait. Uniqueness is
//! enforced under one lock so it behaves like the database constraint.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::AppError;
use crate::models::{
    attendance::AttendanceRecord, class::Class, session::AttendanceSession,
    session_token::CurrentSessionSecret, user::User,
};
use crate::repositories::{
    AttendanceRepositoryTrait, EnrollmentRepositoryTrait, FaceReferenceRepositoryTrait,
    InsertOutcome, SessionRepositoryTrait, SessionSecretRepositoryTrait, UserRepositoryTrait,
};
use crate::types::{ClassId, SessionId, UserId};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    classes: HashMap<ClassId, Class>,
    sessions: HashMap<SessionId, AttendanceSession>,
    enrollments: HashSet<(ClassId, UserId)>,
    secrets: HashMap<SessionId, CurrentSessionSecret>,
    face_references: HashMap<UserId, String>,
    records: Vec<AttendanceRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    pub fn add_class(&self, class: Class) {
        self.lock().classes.insert(class.id, class);
    }

    pub fn add_session(&self, session: AttendanceSession) {
        self.lock().sessions.insert(session.id, session);
    }

    pub fn enroll(&self, class_id: ClassId, student_id: UserId) {
        self.lock().enrollments.insert((class_id, student_id));
    }

    pub fn set_face_reference(&self, student_id: UserId, features: impl Into<String>) {
        self.lock()
            .face_references
            .insert(student_id, features.into());
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.lock().records.clone()
    }

    pub fn session(&self, id: SessionId) -> Option<AttendanceSession> {
        self.lock().sessions.get(&id).cloned()
    }
}

#[async_trait]
impl UserRepositoryTrait for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.get(&id).cloned())
    }
}

#[async_trait]
impl SessionRepositoryTrait for InMemoryStore {
    async fn find_session(&self, id: SessionId) -> Result<Option<AttendanceSession>, AppError> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    async fn find_class(&self, id: ClassId) -> Result<Option<Class>, AppError> {
        Ok(self.lock().classes.get(&id).cloned())
    }

    async fn create_session(
        &self,
        session: &AttendanceSession,
    ) -> Result<AttendanceSession, AppError> {
        let mut state = self.lock();
        if state.sessions.contains_key(&session.id) {
            return Err(AppError::Conflict("Resource already exists".into()));
        }
        state.sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn end_session(&self, id: SessionId) -> Result<bool, AppError> {
        let mut state = self.lock();
        match state.sessions.get_mut(&id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_elapsed_sessions(
        &self,
        now: DateTime<Utc>,
        tz: Tz,
        auto_expire_hours: i32,
    ) -> Result<u64, AppError> {
        let window = Duration::hours(i64::from(auto_expire_hours));
        let mut expired = 0;
        for session in self.lock().sessions.values_mut() {
            if session.is_active && !session.is_live(now, &tz, window) {
                session.is_active = false;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl EnrollmentRepositoryTrait for InMemoryStore {
    async fn is_enrolled(&self, class_id: ClassId, student_id: UserId) -> Result<bool, AppError> {
        Ok(self.lock().enrollments.contains(&(class_id, student_id)))
    }
}

#[async_trait]
impl AttendanceRepositoryTrait for InMemoryStore {
    async fn find_by_session_and_student(
        &self,
        session_id: SessionId,
        student_id: UserId,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        Ok(self
            .lock()
            .records
            .iter()
            .find(|r| r.session_id == session_id && r.student_id == student_id)
            .cloned())
    }

    async fn insert_unique(&self, record: &AttendanceRecord) -> Result<InsertOutcome, AppError> {
        let mut state = self.lock();
        let exists = state
            .records
            .iter()
            .any(|r| r.session_id == record.session_id && r.student_id == record.student_id);
        if exists {
            return Ok(InsertOutcome::Duplicate);
        }
        state.records.push(record.clone());
        Ok(InsertOutcome::Inserted(record.clone()))
    }

    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut rows: Vec<_> = self
            .lock()
            .records
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.recorded_at, r.id));
        Ok(rows)
    }

    async fn list_for_student(
        &self,
        student_id: UserId,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut rows: Vec<_> = self
            .lock()
            .records
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl SessionSecretRepositoryTrait for InMemoryStore {
    async fn replace_current(&self, secret: &CurrentSessionSecret) -> Result<(), AppError> {
        self.lock().secrets.insert(secret.session_id, secret.clone());
        Ok(())
    }

    async fn current(
        &self,
        session_id: SessionId,
    ) -> Result<Option<CurrentSessionSecret>, AppError> {
        Ok(self.lock().secrets.get(&session_id).cloned())
    }

    async fn clear(&self, session_id: SessionId) -> Result<(), AppError> {
        self.lock().secrets.remove(&session_id);
        Ok(())
    }
}

#[async_trait]
impl FaceReferenceRepositoryTrait for InMemoryStore {
    async fn find_reference(&self, student_id: UserId) -> Result<Option<String>, AppError> {
        Ok(self.lock().face_references.get(&student_id).cloned())
    }
}
