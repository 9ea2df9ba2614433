//! Data models shared across database access, services and API handlers.

pub mod attendance;
pub mod check_in;
pub mod class;
pub mod session;
pub mod session_token;
pub mod user;
