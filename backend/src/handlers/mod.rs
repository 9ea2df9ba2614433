pub mod attendance;
pub mod check_in;
pub mod health;
pub mod session_tokens;
pub mod sessions;
