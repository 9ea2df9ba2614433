use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::AppError;
use crate::models::check_in::CheckInResponse;

/// Every way a token issue or check-in can fail. Nothing but `Internal` is
/// logged as an error; the rest are user-actionable and carry no side effects.
#[derive(Debug, thiserror::Error)]
pub enum CheckInFailure {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("this attendance session is closed")]
    SessionClosed,
    #[error("you are not enrolled in this class")]
    NotEnrolled,
    #[error("{0}")]
    Mismatch(String),
    #[error("this QR code has expired, scan the current one")]
    Expired,
    #[error("this QR code is not valid for the session")]
    Invalid,
    #[error("location coordinates are out of range")]
    InvalidCoordinates,
    #[error("location is required for this check-in method")]
    LocationRequired,
    #[error("{0}")]
    MissingEvidence(String),
    #[error("{0}")]
    ConfigurationError(String),
    #[error("you are {distance_meters:.0}m away, check-in requires being within {allowed_radius:.0}m")]
    TooFar {
        distance_meters: f64,
        allowed_radius: f64,
        room: Option<String>,
    },
    #[error("face match score {match_score:.2} is below the required threshold")]
    LowMatchScore { match_score: f64 },
    #[error("verification service unavailable: {0}")]
    VerificationUnavailable(String),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl CheckInFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            CheckInFailure::Unauthenticated => "unauthenticated",
            CheckInFailure::Forbidden(_) => "forbidden",
            CheckInFailure::NotFound(_) => "not_found",
            CheckInFailure::SessionClosed => "session_closed",
            CheckInFailure::NotEnrolled => "not_enrolled",
            CheckInFailure::Mismatch(_) => "mismatch",
            CheckInFailure::Expired => "expired",
            CheckInFailure::Invalid => "invalid",
            CheckInFailure::InvalidCoordinates => "invalid_coordinates",
            CheckInFailure::LocationRequired => "location_required",
            CheckInFailure::MissingEvidence(_) => "missing_evidence",
            CheckInFailure::ConfigurationError(_) => "configuration_error",
            CheckInFailure::TooFar { .. } => "too_far",
            CheckInFailure::LowMatchScore { .. } => "low_match_score",
            CheckInFailure::VerificationUnavailable(_) => "verification_unavailable",
            CheckInFailure::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckInFailure::Unauthenticated => StatusCode::UNAUTHORIZED,
            CheckInFailure::Forbidden(_) | CheckInFailure::NotEnrolled => StatusCode::FORBIDDEN,
            CheckInFailure::NotFound(_) => StatusCode::NOT_FOUND,
            CheckInFailure::SessionClosed => StatusCode::CONFLICT,
            CheckInFailure::Mismatch(_)
            | CheckInFailure::InvalidCoordinates
            | CheckInFailure::LocationRequired
            | CheckInFailure::MissingEvidence(_) => StatusCode::BAD_REQUEST,
            CheckInFailure::Expired | CheckInFailure::Invalid => StatusCode::UNAUTHORIZED,
            CheckInFailure::ConfigurationError(_) => StatusCode::PRECONDITION_FAILED,
            CheckInFailure::TooFar { .. } | CheckInFailure::LowMatchScore { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CheckInFailure::VerificationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CheckInFailure::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The body sent to clients. Internal failures never leak their cause.
    pub fn to_response(&self) -> CheckInResponse {
        let message = match self {
            CheckInFailure::Internal(_) => "Something went wrong, please try again".to_string(),
            CheckInFailure::VerificationUnavailable(_) => {
                "Face verification is temporarily unavailable, please try again".to_string()
            }
            other => other.to_string(),
        };
        let (distance_meters, allowed_radius, room, match_score) = match self {
            CheckInFailure::TooFar {
                distance_meters,
                allowed_radius,
                room,
            } => (
                Some(distance_meters.round()),
                Some(*allowed_radius),
                room.clone(),
                None,
            ),
            CheckInFailure::LowMatchScore { match_score } => (None, None, None, Some(*match_score)),
            _ => (None, None, None, None),
        };
        CheckInResponse {
            success: false,
            status: None,
            reason: Some(self.reason().to_string()),
            message,
            distance_meters,
            allowed_radius,
            room,
            match_score,
            low_assurance: false,
        }
    }
}

impl IntoResponse for CheckInFailure {
    fn into_response(self) -> Response {
        if let CheckInFailure::Internal(err) = &self {
            tracing::error!("Check-in internal error: {:?}", err);
        }
        (self.status_code(), Json(self.to_response())).into_response()
    }
}

impl From<AppError> for CheckInFailure {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => CheckInFailure::NotFound(msg),
            AppError::Forbidden(msg) => CheckInFailure::Forbidden(msg),
            AppError::Unauthorized(_) => CheckInFailure::Unauthenticated,
            AppError::InternalServerError(err) => CheckInFailure::Internal(err),
            other => CheckInFailure::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<CheckInFailure> for AppError {
    fn from(failure: CheckInFailure) -> Self {
        match failure {
            CheckInFailure::Unauthenticated => AppError::Unauthorized(failure.to_string()),
            CheckInFailure::Forbidden(msg) => AppError::Forbidden(msg),
            CheckInFailure::NotFound(msg) => AppError::NotFound(msg),
            CheckInFailure::SessionClosed => AppError::Conflict(failure.to_string()),
            CheckInFailure::Internal(err) => AppError::InternalServerError(err),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}
