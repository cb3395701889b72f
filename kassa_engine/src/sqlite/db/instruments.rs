use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewInstrument, PaymentInstrument},
    traits::InstrumentApiError,
};

pub async fn add_instrument(
    instrument: NewInstrument,
    conn: &mut SqliteConnection,
) -> Result<PaymentInstrument, InstrumentApiError> {
    let account_number = instrument.account_number.clone();
    let result: Result<PaymentInstrument, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO instruments (bank_name, account_number, recipient_name)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(instrument.bank_name)
    .bind(instrument.account_number)
    .bind(instrument.recipient_name)
    .fetch_one(conn)
    .await;
    match result {
        Ok(instrument) => {
            debug!("🗃️ Instrument #{} ({}) added to the catalog", instrument.id, instrument.bank_name);
            Ok(instrument)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(InstrumentApiError::DuplicateAccountNumber(account_number))
        },
        Err(e) => Err(e.into()),
    }
}

/// Deletes the catalog row. Orders keep their snapshotted copy of the details.
pub async fn remove_instrument(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInstrument>, sqlx::Error> {
    let instrument =
        sqlx::query_as("DELETE FROM instruments WHERE id = $1 RETURNING *").bind(id).fetch_optional(conn).await?;
    Ok(instrument)
}

pub async fn fetch_instrument(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentInstrument>, sqlx::Error> {
    let instrument = sqlx::query_as("SELECT * FROM instruments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(instrument)
}

pub async fn list_instruments(conn: &mut SqliteConnection) -> Result<Vec<PaymentInstrument>, sqlx::Error> {
    let instruments = sqlx::query_as("SELECT * FROM instruments ORDER BY id").fetch_all(conn).await?;
    Ok(instruments)
}

/// Distinct bank names in catalog order (oldest instrument first).
pub async fn list_banks(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let banks = sqlx::query_scalar("SELECT bank_name FROM instruments GROUP BY bank_name ORDER BY MIN(id)")
        .fetch_all(conn)
        .await?;
    Ok(banks)
}

pub async fn fetch_instrument_by_bank(
    bank_name: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInstrument>, sqlx::Error> {
    let instrument = sqlx::query_as("SELECT * FROM instruments WHERE bank_name = $1 ORDER BY id LIMIT 1")
        .bind(bank_name)
        .fetch_optional(conn)
        .await?;
    Ok(instrument)
}
