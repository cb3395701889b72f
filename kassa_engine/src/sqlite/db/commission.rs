use sqlx::SqliteConnection;

use crate::db_types::CommissionSetting;

pub async fn latest_setting(conn: &mut SqliteConnection) -> Result<Option<CommissionSetting>, sqlx::Error> {
    let setting = sqlx::query_as("SELECT * FROM commission_history ORDER BY id DESC LIMIT 1")
        .fetch_optional(conn)
        .await?;
    Ok(setting)
}

pub async fn append_setting(rate: f64, conn: &mut SqliteConnection) -> Result<CommissionSetting, sqlx::Error> {
    let setting = sqlx::query_as("INSERT INTO commission_history (rate) VALUES ($1) RETURNING *")
        .bind(rate)
        .fetch_one(conn)
        .await?;
    Ok(setting)
}
