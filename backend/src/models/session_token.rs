use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::SessionId;

/// Signed QR payload. Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub session_id: SessionId,
    pub issued_at: i64,
    pub secret: String,
    pub expires_at: i64,
    pub signature: String,
}

/// The fields covered by the signature, in canonical order.
#[derive(Debug, Serialize)]
pub struct SessionTokenClaims<'a> {
    pub session_id: SessionId,
    pub issued_at: i64,
    pub secret: &'a str,
    pub expires_at: i64,
}

impl SessionToken {
    pub fn claims(&self) -> SessionTokenClaims<'_> {
        SessionTokenClaims {
            session_id: self.session_id,
            issued_at: self.issued_at,
            secret: &self.secret,
            expires_at: self.expires_at,
        }
    }
}

/// Server-side copy of the one secret a session currently accepts.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CurrentSessionSecret {
    pub session_id: SessionId,
    pub secret: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
