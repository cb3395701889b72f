//! SQLite database module for the Kassa engine.

mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;

/// Applies any outstanding schema migrations to the given pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./src/sqlite/migrations").run(pool).await
}
