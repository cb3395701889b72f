//! Transport-side glue for the Kassa service.
//!
//! The heavy lifting (funnel, approval, admin, persistence) lives in `kassa_engine`. This crate
//! supplies everything that touches the outside world: environment configuration, the
//! [`messenger::ChatMessenger`] seam behind which the actual chat transport sits, prompt
//! rendering, the inbound-update router, the CoinGecko rate adapter and the service-window
//! scheduler.
pub mod config;
pub mod errors;
pub mod integrations;
pub mod messenger;
pub mod render;
pub mod router;
pub mod schedule;

use log::*;

use crate::{config::BotConfig, errors::BotError, schedule::start_schedule_worker};

/// Initialises the database, applies migrations, starts the schedule worker and parks until
/// interrupted. The chat transport (out of scope here) drives [`router::Router::dispatch`] with
/// inbound updates.
pub async fn run(config: BotConfig) -> Result<(), BotError> {
    let db = kassa_engine::SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| BotError::DatabaseError(e.to_string()))?;
    kassa_engine::sqlite::run_migrations(db.pool()).await.map_err(|e| BotError::DatabaseError(e.to_string()))?;
    info!("🚀️ Database ready at {}", config.database_url);
    let schedule = schedule::ServiceSchedule::always_on();
    let _worker = start_schedule_worker(schedule.clone());
    tokio::signal::ctrl_c().await?;
    info!("🚀️ Shutting down");
    Ok(())
}
