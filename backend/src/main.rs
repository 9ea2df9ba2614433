use std::{net::SocketAddr, sync::Arc, time::Duration};

use rollcall_backend::{
    build_router,
    config::Config,
    db::{create_pool, migrate},
    init_tracing, mask_secret,
    repositories::Repositories,
    services::{FaceMatchOracle, HttpFaceMatchOracle, UnconfiguredFaceMatchOracle},
    state::AppState,
    utils::time::SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        jwt_secret = %mask_secret(&config.jwt_secret),
        session_token_secret = %mask_secret(&config.session_token_secret),
        time_zone = %config.time_zone,
        qr_requires_geofence = config.qr_requires_geofence,
        allow_unfenced_verified_checkin = config.allow_unfenced_verified_checkin,
        face_match_configured = config.face_match_url.is_some(),
        session_auto_expire_hours = config.session_auto_expire_hours,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool = create_pool(&config.database_url).await?;
    migrate(&pool).await?;

    let oracle: Arc<dyn FaceMatchOracle> = match &config.face_match_url {
        Some(url) => Arc::new(HttpFaceMatchOracle::new(
            url.clone(),
            config.face_match_api_key.clone(),
            Duration::from_secs(config.face_match_timeout_seconds),
        )?),
        None => {
            tracing::warn!("FACE_MATCH_URL is not set; face check-in will be unavailable");
            Arc::new(UnconfiguredFaceMatchOracle)
        }
    };

    let port = config.port;
    let state = AppState::new(
        config,
        Repositories::postgres(pool),
        oracle,
        Arc::new(SystemClock),
    );
    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
