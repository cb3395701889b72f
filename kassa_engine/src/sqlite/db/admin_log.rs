use sqlx::SqliteConnection;

use crate::db_types::{AdminLogEntry, UserId};

pub async fn insert_entry(
    admin_id: UserId,
    action: &str,
    conn: &mut SqliteConnection,
) -> Result<AdminLogEntry, sqlx::Error> {
    let entry = sqlx::query_as("INSERT INTO admin_log (admin_id, action) VALUES ($1, $2) RETURNING *")
        .bind(admin_id)
        .bind(action)
        .fetch_one(conn)
        .await?;
    Ok(entry)
}

pub async fn fetch_entries(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<AdminLogEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM admin_log ORDER BY id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
