use tsdb_driver::{SqlValue, TxHandle};
use tsdb_errors::Result;

pub(crate) fn upsert_row(
    tx: &TxHandle,
    rows_table: &str,
    key_encoded: &str,
    value_json: &str,
    row_version: i64,
    now: i64,
) -> Result<()> {
    tx.run(
        &format!(
            "INSERT INTO {rows_table} (key, value, row_version, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, row_version = excluded.row_version, \
             updated_at = excluded.updated_at"
        ),
        &[
            SqlValue::Text(key_encoded.to_string()),
            SqlValue::Text(value_json.to_string()),
            SqlValue::Integer(row_version),
            SqlValue::Integer(now),
        ],
    )?;
    Ok(())
}

/// Deletes the live row (if any) and upserts a tombstone recording the
/// deletion's row version, so `pullSince` can advertise it without a full
/// reload.
pub(crate) fn delete_row_and_tombstone(
    tx: &TxHandle,
    rows_table: &str,
    tomb_table: &str,
    key_encoded: &str,
    row_version: i64,
    now: i64,
) -> Result<()> {
    tx.run(
        &format!("DELETE FROM {rows_table} WHERE key = ?"),
        &[SqlValue::Text(key_encoded.to_string())],
    )?;
    tx.run(
        &format!(
            "INSERT INTO {tomb_table} (key, deleted_at_row_version, deleted_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET deleted_at_row_version = excluded.deleted_at_row_version, \
             deleted_at = excluded.deleted_at"
        ),
        &[
            SqlValue::Text(key_encoded.to_string()),
            SqlValue::Integer(row_version),
            SqlValue::Integer(now),
        ],
    )?;
    Ok(())
}
