use std::sync::Arc;

use crate::{
    config::Config,
    repositories::Repositories,
    services::{
        AttendanceRecorder, CheckInOrchestrator, CheckInPolicy, FaceMatchOracle, SessionService,
        SessionTokenService,
    },
    utils::time::Clock,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repositories: Repositories,
    pub tokens: Arc<SessionTokenService>,
    pub check_in: Arc<CheckInOrchestrator>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    /// Wires every service from one set of repositories. The check-in policy
    /// table is resolved here, once, from `config`.
    pub fn new(
        config: Config,
        repositories: Repositories,
        oracle: Arc<dyn FaceMatchOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let time_zone = config.time_zone;
        let auto_expire = config.session_auto_expire();

        let tokens = Arc::new(SessionTokenService::new(
            &repositories,
            clock.clone(),
            &config.session_token_secret,
            time_zone,
            auto_expire,
        ));
        let recorder = Arc::new(AttendanceRecorder::new(
            &repositories,
            clock.clone(),
            time_zone,
            auto_expire,
        ));
        let check_in = Arc::new(CheckInOrchestrator::new(
            &repositories,
            tokens.clone(),
            recorder,
            oracle,
            CheckInPolicy::from_config(&config),
        ));
        let sessions = Arc::new(SessionService::new(
            &repositories,
            clock,
            time_zone,
            auto_expire,
        ));

        Self {
            config,
            repositories,
            tokens,
            check_in,
            sessions,
        }
    }
}
