//! Persists implicit session expiry. Liveness checks already treat these
//! sessions as closed; this keeps `is_active` in storage honest for reports.

use std::sync::Arc;

use rollcall_backend::{
    config::Config, db::create_pool, init_tracing, repositories::Repositories,
    services::SessionService, utils::time::SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;

    let service = SessionService::new(
        &Repositories::postgres(pool),
        Arc::new(SystemClock),
        config.time_zone,
        config.session_auto_expire(),
    );
    let expired = service.expire_elapsed().await?;
    if expired > 0 {
        tracing::info!("Expired {} attendance sessions", expired);
    }

    Ok(())
}
