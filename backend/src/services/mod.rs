pub mod attendance_recorder;
pub mod check_in;
pub mod face_match;
pub mod proximity;
pub mod session;
pub mod session_token;

pub use attendance_recorder::{AttendanceRecorder, RecordRequest};
pub use check_in::{CheckInOrchestrator, CheckInPolicy, FACE_MATCH_THRESHOLD};
pub use face_match::{FaceMatchOracle, HttpFaceMatchOracle, UnconfiguredFaceMatchOracle};
pub use proximity::ProximityGate;
pub use session::SessionService;
pub use session_token::{SessionTokenService, SESSION_TOKEN_TTL_MS};
