use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{ClassId, SessionId};

/// Arrivals after `start + LATE_GRACE_MINUTES` are recorded as late.
pub const LATE_GRACE_MINUTES: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceSession {
    pub id: SessionId,
    pub class_id: ClassId,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AttendanceSession {
    pub fn new(class_id: ClassId, session_date: NaiveDate, start_time: NaiveTime) -> Self {
        Self {
            id: SessionId::new(),
            class_id,
            session_date,
            start_time,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Absolute start instant, interpreting date and time in `tz`. A start time that
    /// falls in a DST gap is shifted one hour forward.
    pub fn starts_at(&self, tz: &Tz) -> DateTime<Utc> {
        let naive = self.session_date.and_time(self.start_time);
        tz.from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }

    pub fn late_threshold(&self, tz: &Tz) -> DateTime<Utc> {
        self.starts_at(tz) + Duration::minutes(LATE_GRACE_MINUTES)
    }

    /// Active and not yet past its implicit expiry.
    pub fn is_live(&self, now: DateTime<Utc>, tz: &Tz, auto_expire: Duration) -> bool {
        self.is_active && now < self.starts_at(tz) + auto_expire
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub session_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
}
