use anyhow::anyhow;
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// HMAC key for QR session tokens. Never sent to clients.
    pub session_token_secret: String,
    pub time_zone: Tz,
    /// QR check-in must also pass the classroom geofence.
    pub qr_requires_geofence: bool,
    /// QR and face check-in skip the geofence gate for classes without a center.
    pub allow_unfenced_verified_checkin: bool,
    pub face_match_url: Option<String>,
    pub face_match_api_key: Option<String>,
    pub face_match_timeout_seconds: u64,
    pub session_auto_expire_hours: i64,
    pub cors_allow_origins: Vec<String>,
    pub port: u16,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/rollcall".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-this-in-production".to_string());

        let session_token_secret = env::var("SESSION_TOKEN_SECRET")
            .unwrap_or_else(|_| "session-token-key-change-this-in-production".to_string());

        let time_zone_name = env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let time_zone: Tz = time_zone_name
            .parse()
            .map_err(|_| anyhow!("Invalid APP_TIMEZONE value: {}", time_zone_name))?;

        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Config {
            database_url,
            jwt_secret,
            session_token_secret,
            time_zone,
            qr_requires_geofence: parse_bool_env("QR_REQUIRES_GEOFENCE", true),
            allow_unfenced_verified_checkin: parse_bool_env(
                "ALLOW_UNFENCED_VERIFIED_CHECKIN",
                false,
            ),
            face_match_url: non_empty_env("FACE_MATCH_URL"),
            face_match_api_key: non_empty_env("FACE_MATCH_API_KEY"),
            face_match_timeout_seconds: parse_env("FACE_MATCH_TIMEOUT_SECONDS", 15),
            session_auto_expire_hours: parse_env("SESSION_AUTO_EXPIRE_HOURS", 4),
            cors_allow_origins,
            port: parse_env("PORT", 3000),
        })
    }

    pub fn session_auto_expire(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_auto_expire_hours.max(1))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|value| parse_bool(&value))
        .unwrap_or(default)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
