//! Request and response shapes shared by every check-in method.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::attendance::{AttendanceRecord, AttendanceStatus, CheckInMethod};
use crate::models::session_token::SessionToken;
use crate::types::ClassId;
use crate::utils::geo::Coordinates;

/// A client-reported GPS fix. Spoofed coordinates are not detectable here; the
/// core only applies policy to whatever position it is given.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
}

impl Location {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub method: CheckInMethod,
    #[serde(default)]
    pub class_id: Option<ClassId>,
    #[serde(default)]
    pub token: Option<SessionToken>,
    #[serde(default)]
    pub location: Option<Location>,
    /// Base64 probe image for the face method.
    #[serde(default)]
    pub image: Option<String>,
}

/// What the recorder did with an already-verified check-in.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded(AttendanceRecord),
    AlreadyRecorded,
}

/// Method-specific evidence gathered while gating, echoed back to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GateReport {
    pub distance_meters: Option<f64>,
    pub allowed_radius: Option<f64>,
    pub match_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckInResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AttendanceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    /// Set when the record rests on GPS alone.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub low_assurance: bool,
}

impl CheckInResponse {
    pub fn from_outcome(
        outcome: &RecordOutcome,
        method: CheckInMethod,
        report: GateReport,
    ) -> Self {
        let (status, reason, message) = match outcome {
            RecordOutcome::Recorded(record) => (
                Some(record.status),
                None,
                match record.status {
                    AttendanceStatus::Late => "Checked in (late)".to_string(),
                    _ => "Checked in".to_string(),
                },
            ),
            RecordOutcome::AlreadyRecorded => (
                None,
                Some("already_recorded".to_string()),
                "You are already checked in for this session".to_string(),
            ),
        };
        Self {
            success: true,
            status,
            reason,
            message,
            distance_meters: report.distance_meters.map(f64::round),
            allowed_radius: report.allowed_radius,
            room: None,
            match_score: report.match_score,
            low_assurance: method.is_low_assurance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn location_rejects_out_of_range_coordinates() {
        let ok = Location {
            latitude: 90.0,
            longitude: -180.0,
            accuracy: Some(5.0),
        };
        assert!(ok.validate().is_ok());

        let bad_lat = Location {
            latitude: 90.5,
            longitude: 0.0,
            accuracy: None,
        };
        assert!(bad_lat.validate().is_err());

        let bad_lon = Location {
            latitude: 0.0,
            longitude: 181.0,
            accuracy: None,
        };
        assert!(bad_lon.validate().is_err());
    }

    #[test]
    fn already_recorded_is_a_success_flavored_response() {
        let response = CheckInResponse::from_outcome(
            &RecordOutcome::AlreadyRecorded,
            CheckInMethod::Qr,
            GateReport::default(),
        );
        assert!(response.success);
        assert_eq!(response.reason.as_deref(), Some("already_recorded"));
        assert!(response.status.is_none());
    }

    #[test]
    fn check_in_request_accepts_minimal_proximity_payload() {
        let request: CheckInRequest = serde_json::from_value(serde_json::json!({
            "method": "proximity",
            "location": { "latitude": 1.0, "longitude": 2.0 }
        }))
        .unwrap();
        assert_eq!(request.method, CheckInMethod::Proximity);
        assert!(request.token.is_none());
        assert!(request.location.is_some());
    }
}
