//! Turns an already-verified check-in into at most one stored record.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::CheckInFailure;
use crate::models::{
    attendance::{AttendanceRecord, AttendanceStatus, CheckInMethod},
    check_in::RecordOutcome,
    session::AttendanceSession,
};
use crate::repositories::{
    AttendanceRepositoryTrait, EnrollmentRepositoryTrait, InsertOutcome, Repositories,
    SessionRepositoryTrait,
};
use crate::types::{ClassId, SessionId, UserId};
use crate::utils::time::Clock;

#[derive(Debug, Clone, Copy)]
pub struct RecordRequest {
    pub session_id: SessionId,
    pub student_id: UserId,
    /// Class the client believes the session belongs to, if it said.
    pub class_id: Option<ClassId>,
    pub method: CheckInMethod,
    pub verification_score: Option<f64>,
}

pub struct AttendanceRecorder {
    sessions: Arc<dyn SessionRepositoryTrait>,
    enrollments: Arc<dyn EnrollmentRepositoryTrait>,
    attendance: Arc<dyn AttendanceRepositoryTrait>,
    clock: Arc<dyn Clock>,
    time_zone: Tz,
    auto_expire: Duration,
}

impl AttendanceRecorder {
    pub fn new(
        repositories: &Repositories,
        clock: Arc<dyn Clock>,
        time_zone: Tz,
        auto_expire: Duration,
    ) -> Self {
        Self {
            sessions: repositories.sessions.clone(),
            enrollments: repositories.enrollments.clone(),
            attendance: repositories.attendance.clone(),
            clock,
            time_zone,
            auto_expire,
        }
    }

    /// Loads the session and fails unless it is still accepting check-ins.
    pub async fn live_session(&self, session_id: SessionId) -> Result<AttendanceSession, CheckInFailure> {
        self.live_session_at(session_id, self.clock.now()).await
    }

    async fn live_session_at(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSession, CheckInFailure> {
        let session = self
            .sessions
            .find_session(session_id)
            .await?
            .ok_or_else(|| CheckInFailure::NotFound("Attendance session not found".into()))?;
        if !session.is_live(now, &self.time_zone, self.auto_expire) {
            return Err(CheckInFailure::SessionClosed);
        }
        Ok(session)
    }

    pub async fn require_enrollment(
        &self,
        session: &AttendanceSession,
        student_id: UserId,
    ) -> Result<(), CheckInFailure> {
        if !self.enrollments.is_enrolled(session.class_id, student_id).await? {
            return Err(CheckInFailure::NotEnrolled);
        }
        Ok(())
    }

    /// The storage unique constraint on (session, student) is what makes this
    /// at-most-once; the existence check before it only spares a write.
    pub async fn record(&self, request: RecordRequest) -> Result<RecordOutcome, CheckInFailure> {
        let now = self.clock.now();
        let session = self.live_session_at(request.session_id, now).await?;

        if let Some(claimed) = request.class_id {
            if claimed != session.class_id {
                return Err(CheckInFailure::Mismatch(
                    "The session does not belong to the given class".into(),
                ));
            }
        }

        self.require_enrollment(&session, request.student_id).await?;

        if self
            .attendance
            .find_by_session_and_student(session.id, request.student_id)
            .await?
            .is_some()
        {
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        let status = if now > session.late_threshold(&self.time_zone) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };
        let record = AttendanceRecord::new(
            session.id,
            session.class_id,
            request.student_id,
            request.method,
            status,
            request.verification_score,
            now,
        );

        match self.attendance.insert_unique(&record).await? {
            InsertOutcome::Inserted(stored) => {
                tracing::info!(
                    session_id = %stored.session_id,
                    student_id = %stored.student_id,
                    method = %stored.method,
                    status = stored.status.db_value(),
                    "Attendance recorded"
                );
                Ok(RecordOutcome::Recorded(stored))
            }
            InsertOutcome::Duplicate => {
                tracing::debug!(
                    session_id = %session.id,
                    student_id = %request.student_id,
                    "Concurrent check-in lost the insert race"
                );
                Ok(RecordOutcome::AlreadyRecorded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::class::Class;
    use crate::repositories::memory::InMemoryStore;
    use crate::repositories::attendance::MockAttendanceRepositoryTrait;
    use crate::utils::time::FixedClock;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use tokio::sync::Barrier;

    struct Fixture {
        store: Arc<InMemoryStore>,
        clock: Arc<FixedClock>,
        recorder: AttendanceRecorder,
        session_id: SessionId,
        class_id: ClassId,
        student_id: UserId,
    }

    fn nine_am() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn seed(store: &InMemoryStore) -> (SessionId, ClassId, UserId) {
        let class_id = ClassId::new();
        let student_id = UserId::new();
        store.add_class(Class {
            id: class_id,
            professor_id: UserId::new(),
            name: "Databases".into(),
            room: None,
            geofence_latitude: None,
            geofence_longitude: None,
            geofence_radius_meters: None,
            created_at: Utc::now(),
        });
        let session = AttendanceSession::new(
            class_id,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        let session_id = session.id;
        store.add_session(session);
        store.enroll(class_id, student_id);
        (session_id, class_id, student_id)
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(nine_am()));
        let (session_id, class_id, student_id) = seed(&store);
        let recorder = AttendanceRecorder::new(
            &Repositories::in_memory(store.clone()),
            clock.clone(),
            chrono_tz::UTC,
            Duration::hours(4),
        );
        Fixture {
            store,
            clock,
            recorder,
            session_id,
            class_id,
            student_id,
        }
    }

    fn request(f: &Fixture, method: CheckInMethod) -> RecordRequest {
        RecordRequest {
            session_id: f.session_id,
            student_id: f.student_id,
            class_id: Some(f.class_id),
            method,
            verification_score: None,
        }
    }

    #[tokio::test]
    async fn lateness_boundary_is_ten_minutes() {
        let f = fixture();
        f.clock.set(nine_am() + Duration::minutes(9) + Duration::seconds(59));
        match f.recorder.record(request(&f, CheckInMethod::Qr)).await.unwrap() {
            RecordOutcome::Recorded(r) => assert_eq!(r.status, AttendanceStatus::Present),
            other => panic!("expected a record, got {other:?}"),
        }

        let g = fixture();
        g.clock.set(nine_am() + Duration::minutes(10) + Duration::seconds(1));
        match g.recorder.record(request(&g, CheckInMethod::Qr)).await.unwrap() {
            RecordOutcome::Recorded(r) => assert_eq!(r.status, AttendanceStatus::Late),
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_attempt_is_already_recorded() {
        let f = fixture();
        f.clock.set(nine_am() + Duration::minutes(5));
        assert!(matches!(
            f.recorder.record(request(&f, CheckInMethod::Qr)).await.unwrap(),
            RecordOutcome::Recorded(_)
        ));
        f.clock.advance(Duration::minutes(1));
        assert!(matches!(
            f.recorder.record(request(&f, CheckInMethod::Proximity)).await.unwrap(),
            RecordOutcome::AlreadyRecorded
        ));
        assert_eq!(f.store.records().len(), 1);
    }

    /// Holds every lookup until two callers have seen "no record yet", so both
    /// reach the unique insert.
    struct LookupBarrier {
        inner: Arc<InMemoryStore>,
        barrier: Barrier,
    }

    #[async_trait]
    impl AttendanceRepositoryTrait for LookupBarrier {
        async fn find_by_session_and_student(
            &self,
            session_id: SessionId,
            student_id: UserId,
        ) -> Result<Option<AttendanceRecord>, AppError> {
            let found = self
                .inner
                .find_by_session_and_student(session_id, student_id)
                .await?;
            self.barrier.wait().await;
            Ok(found)
        }

        async fn insert_unique(&self, record: &AttendanceRecord) -> Result<InsertOutcome, AppError> {
            self.inner.insert_unique(record).await
        }

        async fn list_for_session(
            &self,
            session_id: SessionId,
        ) -> Result<Vec<AttendanceRecord>, AppError> {
            self.inner.list_for_session(session_id).await
        }

        async fn list_for_student(
            &self,
            student_id: UserId,
        ) -> Result<Vec<AttendanceRecord>, AppError> {
            self.inner.list_for_student(student_id).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_methods_converge_to_one_record() {
        let store = Arc::new(InMemoryStore::new());
        let (session_id, class_id, student_id) = seed(&store);
        let mut repositories = Repositories::in_memory(store.clone());
        repositories.attendance = Arc::new(LookupBarrier {
            inner: store.clone(),
            barrier: Barrier::new(2),
        });
        let recorder = Arc::new(AttendanceRecorder::new(
            &repositories,
            Arc::new(FixedClock::new(nine_am())),
            chrono_tz::UTC,
            Duration::hours(4),
        ));

        let attempt = |method| {
            let recorder = recorder.clone();
            tokio::spawn(async move {
                recorder
                    .record(RecordRequest {
                        session_id,
                        student_id,
                        class_id: Some(class_id),
                        method,
                        verification_score: None,
                    })
                    .await
            })
        };
        let qr = attempt(CheckInMethod::Qr);
        let proximity = attempt(CheckInMethod::Proximity);
        let outcomes = [qr.await.unwrap().unwrap(), proximity.await.unwrap().unwrap()];

        let recorded = outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Recorded(_)))
            .count();
        let duplicates = outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::AlreadyRecorded))
            .count();
        assert_eq!((recorded, duplicates), (1, 1));
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn lost_insert_race_is_reported_as_already_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let (session_id, class_id, student_id) = seed(&store);

        let mut attendance = MockAttendanceRepositoryTrait::new();
        attendance
            .expect_find_by_session_and_student()
            .returning(|_, _| Ok(None));
        attendance
            .expect_insert_unique()
            .times(1)
            .returning(|_| Ok(InsertOutcome::Duplicate));

        let mut repositories = Repositories::in_memory(store);
        repositories.attendance = Arc::new(attendance);
        let recorder = AttendanceRecorder::new(
            &repositories,
            Arc::new(FixedClock::new(nine_am())),
            chrono_tz::UTC,
            Duration::hours(4),
        );

        let outcome = recorder
            .record(RecordRequest {
                session_id,
                student_id,
                class_id: Some(class_id),
                method: CheckInMethod::Face,
                verification_score: Some(0.9),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, RecordOutcome::AlreadyRecorded));
    }

    #[tokio::test]
    async fn storage_failure_surfaces_as_internal() {
        let store = Arc::new(InMemoryStore::new());
        let (session_id, _, student_id) = seed(&store);

        let mut attendance = MockAttendanceRepositoryTrait::new();
        attendance
            .expect_find_by_session_and_student()
            .returning(|_, _| Ok(None));
        attendance.expect_insert_unique().returning(|_| {
            Err(AppError::InternalServerError(anyhow::anyhow!(
                "connection reset"
            )))
        });

        let mut repositories = Repositories::in_memory(store);
        repositories.attendance = Arc::new(attendance);
        let recorder = AttendanceRecorder::new(
            &repositories,
            Arc::new(FixedClock::new(nine_am())),
            chrono_tz::UTC,
            Duration::hours(4),
        );

        let err = recorder
            .record(RecordRequest {
                session_id,
                student_id,
                class_id: None,
                method: CheckInMethod::Qr,
                verification_score: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CheckInFailure::Internal(_)));
    }

    #[tokio::test]
    async fn class_mismatch_is_rejected_without_writing() {
        let f = fixture();
        let mut req = request(&f, CheckInMethod::Qr);
        req.class_id = Some(ClassId::new());
        assert!(matches!(
            f.recorder.record(req).await,
            Err(CheckInFailure::Mismatch(_))
        ));
        assert!(f.store.records().is_empty());
    }

    #[tokio::test]
    async fn unenrolled_student_is_rejected() {
        let f = fixture();
        let mut req = request(&f, CheckInMethod::Qr);
        req.student_id = UserId::new();
        assert!(matches!(
            f.recorder.record(req).await,
            Err(CheckInFailure::NotEnrolled)
        ));
        assert!(f.store.records().is_empty());
    }

    #[tokio::test]
    async fn closed_or_missing_session_is_rejected() {
        let f = fixture();
        f.store.end_session(f.session_id).await.unwrap();
        assert!(matches!(
            f.recorder.record(request(&f, CheckInMethod::Qr)).await,
            Err(CheckInFailure::SessionClosed)
        ));

        let mut req = request(&f, CheckInMethod::Qr);
        req.session_id = SessionId::new();
        assert!(matches!(
            f.recorder.record(req).await,
            Err(CheckInFailure::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn session_past_auto_expiry_is_closed() {
        let f = fixture();
        f.clock.set(nine_am() + Duration::hours(4));
        assert!(matches!(
            f.recorder.record(request(&f, CheckInMethod::Qr)).await,
            Err(CheckInFailure::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn verification_score_is_stored() {
        let f = fixture();
        let mut req = request(&f, CheckInMethod::Face);
        req.verification_score = Some(0.82);
        f.recorder.record(req).await.unwrap();
        assert_eq!(f.store.records()[0].verification_score, Some(0.82));
    }
}
