use std::sync::Arc;

use sqlx::PgPool;

pub mod attendance;
pub mod enrollment;
pub mod face_reference;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod session;
pub mod session_secret;
pub mod user;

pub use attendance::{AttendanceRepository, AttendanceRepositoryTrait, InsertOutcome};
pub use enrollment::{EnrollmentRepository, EnrollmentRepositoryTrait};
pub use face_reference::{FaceReferenceRepository, FaceReferenceRepositoryTrait};
pub use session::{SessionRepository, SessionRepositoryTrait};
pub use session_secret::{SessionSecretRepository, SessionSecretRepositoryTrait};
pub use user::{UserRepository, UserRepositoryTrait};

/// Every storage collaborator the services need, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepositoryTrait>,
    pub sessions: Arc<dyn SessionRepositoryTrait>,
    pub enrollments: Arc<dyn EnrollmentRepositoryTrait>,
    pub attendance: Arc<dyn AttendanceRepositoryTrait>,
    pub secrets: Arc<dyn SessionSecretRepositoryTrait>,
    pub face_references: Arc<dyn FaceReferenceRepositoryTrait>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            sessions: Arc::new(SessionRepository::new(pool.clone())),
            enrollments: Arc::new(EnrollmentRepository::new(pool.clone())),
            attendance: Arc::new(AttendanceRepository::new(pool.clone())),
            secrets: Arc::new(SessionSecretRepository::new(pool.clone())),
            face_references: Arc::new(FaceReferenceRepository::new(pool)),
        }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory(store: Arc<memory::InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            enrollments: store.clone(),
            attendance: store.clone(),
            secrets: store.clone(),
            face_references: store,
        }
    }
}
