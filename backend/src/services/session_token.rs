//! Short-lived signed tokens rendered as the rotating QR code.
//!
//! The HMAC only proves the payload was not edited in transit. Freshness comes
//! from the stored secret: a session holds exactly one, and issuing a new token
//! overwrites it, so every earlier QR frame stops verifying immediately.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use chrono_tz::Tz;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use crate::error::CheckInFailure;
use crate::models::{
    session::AttendanceSession,
    session_token::{CurrentSessionSecret, SessionToken, SessionTokenClaims},
    user::User,
};
use crate::repositories::{Repositories, SessionRepositoryTrait, SessionSecretRepositoryTrait};
use crate::types::SessionId;
use crate::utils::time::Clock;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_TOKEN_TTL_MS: i64 = 30_000;
const SECRET_BYTES: usize = 32;

pub struct SessionTokenService {
    sessions: Arc<dyn SessionRepositoryTrait>,
    secrets: Arc<dyn SessionSecretRepositoryTrait>,
    clock: Arc<dyn Clock>,
    signing_key: Vec<u8>,
    time_zone: Tz,
    auto_expire: Duration,
}

impl SessionTokenService {
    pub fn new(
        repositories: &Repositories,
        clock: Arc<dyn Clock>,
        signing_key: &str,
        time_zone: Tz,
        auto_expire: Duration,
    ) -> Self {
        Self {
            sessions: repositories.sessions.clone(),
            secrets: repositories.secrets.clone(),
            clock,
            signing_key: signing_key.as_bytes().to_vec(),
            time_zone,
            auto_expire,
        }
    }

    /// Issues a fresh token for `session_id`, replacing the previous one.
    pub async fn issue(
        &self,
        session_id: SessionId,
        caller: &User,
    ) -> Result<SessionToken, CheckInFailure> {
        let session = self
            .sessions
            .find_session(session_id)
            .await?
            .ok_or_else(|| CheckInFailure::NotFound("Attendance session not found".into()))?;
        let class = self
            .sessions
            .find_class(session.class_id)
            .await?
            .ok_or_else(|| CheckInFailure::NotFound("Class not found".into()))?;
        if !class.is_owned_by(caller.id) {
            return Err(CheckInFailure::Forbidden(
                "Only the professor who owns this class can display its QR code".into(),
            ));
        }

        let now = self.clock.now();
        if !session.is_live(now, &self.time_zone, self.auto_expire) {
            return Err(CheckInFailure::SessionClosed);
        }

        let issued_at = now.timestamp_millis();
        let expires_at = issued_at + SESSION_TOKEN_TTL_MS;
        let secret = generate_secret();
        let signature = self.sign(&SessionTokenClaims {
            session_id,
            issued_at,
            secret: &secret,
            expires_at,
        })?;

        self.secrets
            .replace_current(&CurrentSessionSecret {
                session_id,
                secret: secret.clone(),
                issued_at: millis_to_datetime(issued_at)?,
                expires_at: millis_to_datetime(expires_at)?,
            })
            .await?;

        tracing::debug!(%session_id, issued_at, expires_at, "Issued session token");

        Ok(SessionToken {
            session_id,
            issued_at,
            secret,
            expires_at,
            signature,
        })
    }

    /// Checks expiry, signature, session liveness and the stored secret, in
    /// that order. Success only authorizes the caller to proceed to recording.
    pub async fn verify(&self, token: &SessionToken) -> Result<AttendanceSession, CheckInFailure> {
        let now = self.clock.now();
        if now.timestamp_millis() > token.expires_at {
            return Err(CheckInFailure::Expired);
        }

        let signature = hex::decode(&token.signature).map_err(|_| CheckInFailure::Invalid)?;
        self.mac_for(&token.claims())?
            .verify_slice(&signature)
            .map_err(|_| CheckInFailure::Invalid)?;

        let session = self
            .sessions
            .find_session(token.session_id)
            .await?
            .ok_or_else(|| CheckInFailure::NotFound("Attendance session not found".into()))?;
        if !session.is_live(now, &self.time_zone, self.auto_expire) {
            return Err(CheckInFailure::SessionClosed);
        }

        let current = self
            .secrets
            .current(token.session_id)
            .await?
            .ok_or(CheckInFailure::Invalid)?;
        if !self.secrets_match(&current.secret, &token.secret)? {
            return Err(CheckInFailure::Invalid);
        }

        Ok(session)
    }

    fn sign(&self, claims: &SessionTokenClaims<'_>) -> Result<String, CheckInFailure> {
        Ok(hex::encode(self.mac_for(claims)?.finalize().into_bytes()))
    }

    fn mac_for(&self, claims: &SessionTokenClaims<'_>) -> Result<HmacSha256, CheckInFailure> {
        let canonical = serde_json::to_vec(claims)
            .map_err(|e| CheckInFailure::Internal(anyhow::anyhow!("encode token claims: {e}")))?;
        let mut mac = self.keyed_mac()?;
        mac.update(&canonical);
        Ok(mac)
    }

    fn keyed_mac(&self) -> Result<HmacSha256, CheckInFailure> {
        HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| CheckInFailure::Internal(anyhow::anyhow!("HMAC key: {e}")))
    }

    /// Constant-time comparison: both secrets are MACed and the tags compared
    /// with `verify_slice`.
    fn secrets_match(&self, stored: &str, presented: &str) -> Result<bool, CheckInFailure> {
        let mut expected = self.keyed_mac()?;
        expected.update(stored.as_bytes());
        let mut actual = self.keyed_mac()?;
        actual.update(presented.as_bytes());
        Ok(expected
            .verify_slice(&actual.finalize().into_bytes())
            .is_ok())
    }
}

fn generate_secret() -> String {
    let mut buf = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

fn millis_to_datetime(ms: i64) -> Result<chrono::DateTime<Utc>, CheckInFailure> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| CheckInFailure::Internal(anyhow::anyhow!("timestamp out of range: {ms}")))
}
