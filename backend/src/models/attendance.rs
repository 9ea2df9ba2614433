use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{AttendanceRecordId, ClassId, SessionId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: AttendanceRecordId,
    pub session_id: SessionId,
    pub class_id: ClassId,
    pub student_id: UserId,
    pub recorded_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub method: CheckInMethod,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub verification_score: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    /// Only assigned by reporting jobs, never by check-in.
    Absent,
}

impl AttendanceStatus {
    pub fn db_value(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInMethod {
    Qr,
    Face,
    Proximity,
    Manual,
}

impl CheckInMethod {
    pub fn db_value(&self) -> &'static str {
        match self {
            CheckInMethod::Qr => "qr",
            CheckInMethod::Face => "face",
            CheckInMethod::Proximity => "proximity",
            CheckInMethod::Manual => "manual",
        }
    }

    /// Proximity alone proves only a GPS fix, which the client controls.
    pub fn is_low_assurance(&self) -> bool {
        matches!(self, CheckInMethod::Proximity)
    }
}

impl TryFrom<String> for AttendanceStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "late" => Ok(AttendanceStatus::Late),
            "absent" => Ok(AttendanceStatus::Absent),
            _ => Err(UnknownVariant {
                kind: "attendance status",
                value,
            }),
        }
    }
}

impl TryFrom<String> for CheckInMethod {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "qr" => Ok(CheckInMethod::Qr),
            "face" => Ok(CheckInMethod::Face),
            "proximity" => Ok(CheckInMethod::Proximity),
            "manual" => Ok(CheckInMethod::Manual),
            _ => Err(UnknownVariant {
                kind: "check-in method",
                value,
            }),
        }
    }
}

impl std::fmt::Display for CheckInMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.db_value())
    }
}

impl AttendanceRecord {
    pub fn new(
        session_id: SessionId,
        class_id: ClassId,
        student_id: UserId,
        method: CheckInMethod,
        status: AttendanceStatus,
        verification_score: Option<f64>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AttendanceRecordId::new(),
            session_id,
            class_id,
            student_id,
            recorded_at,
            method,
            status,
            verification_score: verification_score.map(|s| s.clamp(0.0, 1.0)),
        }
    }
}
