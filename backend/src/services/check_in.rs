//! Method-specific gating in front of the attendance recorder.
//!
//! Which proofs each method needs is declared once in [`CheckInPolicy`]; the
//! orchestrator walks that list in order and stops at the first refusal, so no
//! failing path reaches the recorder.
//!
//! Client GPS is taken at face value. Spoofed coordinates are an accepted risk:
//! the gates apply policy to whatever position they are handed.

use std::sync::Arc;
use std::time::Duration;

use validator::Validate;

use crate::config::Config;
use crate::error::CheckInFailure;
use crate::models::{
    attendance::CheckInMethod,
    check_in::{CheckInRequest, GateReport, Location, RecordOutcome},
    class::Class,
    user::User,
};
use crate::repositories::{FaceReferenceRepositoryTrait, Repositories, SessionRepositoryTrait};
use crate::services::{
    attendance_recorder::{AttendanceRecorder, RecordRequest},
    face_match::{FaceMatchOracle, FaceMatchResult},
    proximity::ProximityGate,
    session_token::SessionTokenService,
};
use crate::types::SessionId;

/// Minimum oracle similarity for a face check-in. Applies to every class.
pub const FACE_MATCH_THRESHOLD: f64 = 0.75;

const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    SessionToken,
    Location,
    Geofence,
    FaceMatch,
}

#[derive(Debug, Clone)]
pub struct CheckInPolicy {
    qr: Vec<Gate>,
    face: Vec<Gate>,
    proximity: Vec<Gate>,
    face_match_threshold: f64,
    allow_unfenced_verified_checkin: bool,
    oracle_timeout: Duration,
}

impl CheckInPolicy {
    pub fn new(qr_requires_geofence: bool) -> Self {
        let qr = if qr_requires_geofence {
            vec![Gate::SessionToken, Gate::Location, Gate::Geofence]
        } else {
            vec![Gate::SessionToken]
        };
        Self {
            qr,
            face: vec![Gate::Location, Gate::Geofence, Gate::FaceMatch],
            proximity: vec![Gate::Location, Gate::Geofence],
            face_match_threshold: FACE_MATCH_THRESHOLD,
            allow_unfenced_verified_checkin: false,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.qr_requires_geofence)
            .with_unfenced_verified_checkin(config.allow_unfenced_verified_checkin)
            .with_oracle_timeout(Duration::from_secs(config.face_match_timeout_seconds))
    }

    pub fn with_face_match_threshold(mut self, threshold: f64) -> Self {
        self.face_match_threshold = threshold;
        self
    }

    /// Lets QR and face check-ins through classes that never configured a
    /// geofence. Proximity check-ins still fail closed.
    pub fn with_unfenced_verified_checkin(mut self, allow: bool) -> Self {
        self.allow_unfenced_verified_checkin = allow;
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn face_match_threshold(&self) -> f64 {
        self.face_match_threshold
    }

    /// Ordered gates for `method`. Manual entries never come through here.
    pub fn gates(&self, method: CheckInMethod) -> Result<&[Gate], CheckInFailure> {
        match method {
            CheckInMethod::Qr => Ok(self.qr.as_slice()),
            CheckInMethod::Face => Ok(self.face.as_slice()),
            CheckInMethod::Proximity => Ok(self.proximity.as_slice()),
            CheckInMethod::Manual => Err(CheckInFailure::Forbidden(
                "Manual attendance is recorded by staff, not by check-in".into(),
            )),
        }
    }
}

/// Evidence accumulated while walking the gates.
#[derive(Debug, Default)]
struct GateState {
    location: Option<Location>,
    report: GateReport,
    proximity_confidence: Option<f64>,
}

pub struct CheckInOrchestrator {
    sessions: Arc<dyn SessionRepositoryTrait>,
    face_references: Arc<dyn FaceReferenceRepositoryTrait>,
    tokens: Arc<SessionTokenService>,
    recorder: Arc<AttendanceRecorder>,
    oracle: Arc<dyn FaceMatchOracle>,
    proximity: ProximityGate,
    policy: CheckInPolicy,
}

impl CheckInOrchestrator {
    pub fn new(
        repositories: &Repositories,
        tokens: Arc<SessionTokenService>,
        recorder: Arc<AttendanceRecorder>,
        oracle: Arc<dyn FaceMatchOracle>,
        policy: CheckInPolicy,
    ) -> Self {
        Self {
            sessions: repositories.sessions.clone(),
            face_references: repositories.face_references.clone(),
            tokens,
            recorder,
            oracle,
            proximity: ProximityGate::new(),
            policy,
        }
    }

    pub async fn check_in(
        &self,
        caller: &User,
        session_id: SessionId,
        request: CheckInRequest,
    ) -> Result<(RecordOutcome, GateReport), CheckInFailure> {
        let method = request.method;
        let result = self.run(caller, session_id, &request).await;
        match &result {
            Ok((outcome, report)) => {
                let outcome_label = match outcome {
                    RecordOutcome::Recorded(record) => record.status.db_value(),
                    RecordOutcome::AlreadyRecorded => "already_recorded",
                };
                tracing::info!(
                    %session_id,
                    student_id = %caller.id,
                    %method,
                    outcome = outcome_label,
                    distance_meters = report.distance_meters,
                    match_score = report.match_score,
                    low_assurance = method.is_low_assurance(),
                    "Check-in accepted"
                );
            }
            Err(CheckInFailure::Internal(err)) => {
                tracing::error!(%session_id, student_id = %caller.id, %method, "Check-in failed: {:?}", err);
            }
            Err(failure) => {
                tracing::info!(
                    %session_id,
                    student_id = %caller.id,
                    %method,
                    reason = failure.reason(),
                    "Check-in rejected"
                );
            }
        }
        result
    }

    async fn run(
        &self,
        caller: &User,
        session_id: SessionId,
        request: &CheckInRequest,
    ) -> Result<(RecordOutcome, GateReport), CheckInFailure> {
        let gates = self.policy.gates(request.method)?;

        // Closed sessions are refused before any oracle round trip.
        let session = self.recorder.live_session(session_id).await?;
        if let Some(claimed) = request.class_id {
            if claimed != session.class_id {
                return Err(CheckInFailure::Mismatch(
                    "The session does not belong to the given class".into(),
                ));
            }
        }
        // Enrollment comes before any evidence is looked at, oracle included.
        self.recorder.require_enrollment(&session, caller.id).await?;
        let class = self
            .sessions
            .find_class(session.class_id)
            .await?
            .ok_or_else(|| CheckInFailure::NotFound("Class not found".into()))?;

        let mut state = GateState::default();
        for gate in gates {
            match gate {
                Gate::SessionToken => self.verify_token(session_id, request).await?,
                Gate::Location => state.location = Some(require_location(request)?),
                Gate::Geofence => self.enforce_geofence(request.method, &class, &mut state)?,
                Gate::FaceMatch => {
                    let result = self.match_face(caller, request).await?;
                    state.report.match_score = Some(result.match_score);
                }
            }
        }

        let verification_score = match request.method {
            CheckInMethod::Face => state.report.match_score,
            CheckInMethod::Proximity => state.proximity_confidence,
            _ => None,
        };
        let outcome = self
            .recorder
            .record(RecordRequest {
                session_id,
                student_id: caller.id,
                class_id: Some(session.class_id),
                method: request.method,
                verification_score,
            })
            .await?;
        Ok((outcome, state.report))
    }

    async fn verify_token(
        &self,
        session_id: SessionId,
        request: &CheckInRequest,
    ) -> Result<(), CheckInFailure> {
        let token = request
            .token
            .as_ref()
            .ok_or_else(|| CheckInFailure::MissingEvidence("A QR token is required".into()))?;
        if token.session_id != session_id {
            return Err(CheckInFailure::Mismatch(
                "The QR code belongs to a different session".into(),
            ));
        }
        self.tokens.verify(token).await?;
        Ok(())
    }

    fn enforce_geofence(
        &self,
        method: CheckInMethod,
        class: &Class,
        state: &mut GateState,
    ) -> Result<(), CheckInFailure> {
        let location = state.location.ok_or(CheckInFailure::LocationRequired)?;
        let position = location.coordinates();

        if !class.geofence().is_configured()
            && method != CheckInMethod::Proximity
            && self.policy.allow_unfenced_verified_checkin
        {
            tracing::debug!(class_id = %class.id, %method, "Class has no geofence, skipping proximity gate");
            return Ok(());
        }

        let check = self.proximity.enforce(position, class)?;
        state.report.distance_meters = check.distance_meters;
        state.report.allowed_radius = Some(check.allowed_radius);
        state.proximity_confidence = check.confidence();
        Ok(())
    }

    async fn match_face(
        &self,
        caller: &User,
        request: &CheckInRequest,
    ) -> Result<FaceMatchResult, CheckInFailure> {
        let image = request
            .image
            .as_deref()
            .filter(|image| !image.is_empty())
            .ok_or_else(|| CheckInFailure::MissingEvidence("A face image is required".into()))?;
        let reference = self
            .face_references
            .find_reference(caller.id)
            .await?
            .ok_or_else(|| {
                CheckInFailure::NotFound("No face reference is registered for this student".into())
            })?;

        let result = tokio::time::timeout(
            self.policy.oracle_timeout,
            self.oracle.compare(image, &reference),
        )
        .await
        .map_err(|_| CheckInFailure::VerificationUnavailable("face verification timed out".into()))?
        .map_err(|e| {
            tracing::warn!(student_id = %caller.id, "Face oracle failed: {}", e);
            CheckInFailure::VerificationUnavailable(e.to_string())
        })?;

        if !result.face_detected
            || !result.is_same_person
            || result.match_score < self.policy.face_match_threshold
        {
            return Err(CheckInFailure::LowMatchScore {
                match_score: result.match_score,
            });
        }
        Ok(result)
    }
}

fn require_location(request: &CheckInRequest) -> Result<Location, CheckInFailure> {
    let location = request.location.ok_or(CheckInFailure::LocationRequired)?;
    location
        .validate()
        .map_err(|_| CheckInFailure::InvalidCoordinates)?;
    if !location.coordinates().is_valid() {
        return Err(CheckInFailure::InvalidCoordinates);
    }
    Ok(location)
}
