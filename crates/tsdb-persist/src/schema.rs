//! Collection metadata bootstrap, lookup, and schema-mismatch handling.
//! Explicit and idempotent (`CREATE TABLE IF NOT EXISTS`) rather than a
//! migration-runner crate.

use tsdb_config::SchemaMismatchPolicy;
use tsdb_driver::{SqlValue, SqliteDriver, TxHandle};
use tsdb_errors::{Result, SchemaMismatchError};
use tsdb_keys::{table_name, TableKind};

use crate::clock::now_millis;

pub(crate) const BOOTSTRAP_SQL: &str = "
CREATE TABLE IF NOT EXISTS _tsdb_collection (
    collection_id TEXT PRIMARY KEY,
    schema_version INTEGER NOT NULL,
    term INTEGER NOT NULL,
    last_seq INTEGER NOT NULL,
    last_row_version INTEGER NOT NULL,
    rows_table TEXT NOT NULL,
    tomb_table TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS _tsdb_index (
    collection_id TEXT NOT NULL,
    signature TEXT NOT NULL,
    spec TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (collection_id, signature)
);
";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CollectionRecord {
    pub collection_id: String,
    pub schema_version: i64,
    pub term: i64,
    pub last_seq: i64,
    pub last_row_version: i64,
    pub rows_table: String,
    pub tomb_table: String,
}

/// Runs once per driver (not per call) in practice, but `CREATE TABLE IF NOT
/// EXISTS` makes repeating it harmless, so every entry point just calls this
/// first rather than tracking whether bootstrap already ran.
pub(crate) async fn bootstrap(driver: &SqliteDriver) -> Result<()> {
    driver.exec(BOOTSTRAP_SQL).await
}

fn rows_ddl(rows_table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {rows_table} (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            row_version INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )"
    )
}

fn tomb_ddl(tomb_table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {tomb_table} (
            key TEXT PRIMARY KEY,
            deleted_at_row_version INTEGER NOT NULL,
            deleted_at INTEGER NOT NULL
        )"
    )
}

fn row_from_columns(
    collection_id: String,
    schema_version: i64,
    term: i64,
    last_seq: i64,
    last_row_version: i64,
    rows_table: String,
    tomb_table: String,
) -> CollectionRecord {
    CollectionRecord {
        collection_id,
        schema_version,
        term,
        last_seq,
        last_row_version,
        rows_table,
        tomb_table,
    }
}

fn fetch(tx: &TxHandle, collection_id: &str) -> Result<Option<CollectionRecord>> {
    let rows = tx.query(
        "SELECT collection_id, schema_version, term, last_seq, last_row_version, rows_table, tomb_table \
         FROM _tsdb_collection WHERE collection_id = ?",
        &[SqlValue::Text(collection_id.to_string())],
        |row| {
            Ok(row_from_columns(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        },
    )?;
    Ok(rows.into_iter().next())
}

fn insert(tx: &TxHandle, collection_id: &str, schema_version: i64) -> Result<CollectionRecord> {
    let rows_table = table_name(collection_id, TableKind::Rows);
    let tomb_table = table_name(collection_id, TableKind::Tombstones);
    tx.exec(&rows_ddl(&rows_table))?;
    tx.exec(&tomb_ddl(&tomb_table))?;

    let now = now_millis();
    tx.run(
        "INSERT INTO _tsdb_collection \
         (collection_id, schema_version, term, last_seq, last_row_version, rows_table, tomb_table, created_at, updated_at) \
         VALUES (?, ?, 1, 0, 0, ?, ?, ?, ?)",
        &[
            SqlValue::Text(collection_id.to_string()),
            SqlValue::Integer(schema_version),
            SqlValue::Text(rows_table.clone()),
            SqlValue::Text(tomb_table.clone()),
            SqlValue::Integer(now),
            SqlValue::Integer(now),
        ],
    )?;

    Ok(CollectionRecord {
        collection_id: collection_id.to_string(),
        schema_version,
        term: 1,
        last_seq: 0,
        last_row_version: 0,
        rows_table,
        tomb_table,
    })
}

/// Truncates rows/tombstones, increments `term`, sets `schema_version`.
/// Leaves `last_seq`/`last_row_version` at zero: a reset collection starts a
/// fresh sequence the way a brand-new one would.
fn reset(tx: &TxHandle, record: &CollectionRecord, new_schema_version: i64) -> Result<CollectionRecord> {
    tx.exec(&format!("DELETE FROM {}", record.rows_table))?;
    tx.exec(&format!("DELETE FROM {}", record.tomb_table))?;
    let now = now_millis();
    tx.run(
        "UPDATE _tsdb_collection \
         SET schema_version = ?, term = term + 1, last_seq = 0, last_row_version = 0, updated_at = ? \
         WHERE collection_id = ?",
        &[
            SqlValue::Integer(new_schema_version),
            SqlValue::Integer(now),
            SqlValue::Text(record.collection_id.clone()),
        ],
    )?;
    Ok(CollectionRecord {
        schema_version: new_schema_version,
        term: record.term + 1,
        last_seq: 0,
        last_row_version: 0,
        ..record.clone()
    })
}

/// Fetches or creates the collection record for `collection_id`, with no
/// schema-version check — used by entry points other than `loadSubset` that
/// don't carry a caller-requested schema version.
pub(crate) fn ensure_exists(tx: &TxHandle, collection_id: &str) -> Result<CollectionRecord> {
    if let Some(record) = fetch(tx, collection_id)? {
        return Ok(record);
    }
    insert(tx, collection_id, 0)
}

/// Fetches or creates the collection record and enforces `policy` against
/// `requested_schema_version`. Creation always succeeds (there's nothing to
/// mismatch against yet); an existing record with a differing
/// `schema_version` is handled according to `policy`.
pub(crate) fn ensure_checked(
    tx: &TxHandle,
    collection_id: &str,
    requested_schema_version: i64,
    policy: SchemaMismatchPolicy,
) -> Result<CollectionRecord> {
    let Some(record) = fetch(tx, collection_id)? else {
        return insert(tx, collection_id, requested_schema_version);
    };

    if record.schema_version == requested_schema_version {
        return Ok(record);
    }

    if policy.resets_on_mismatch() {
        reset(tx, &record, requested_schema_version)
    } else {
        Err(SchemaMismatchError {
            expected: requested_schema_version,
            found: record.schema_version,
        }
        .into())
    }
}

/// Read-only status snapshot for a collection, creating it (at schema
/// version 0) if it has never been referenced before. Used by callers that
/// need to seed a watermark from current adapter state without going
/// through `loadSubset`'s schema-check path.
pub(crate) fn status(tx: &TxHandle, collection_id: &str) -> Result<crate::types::CollectionStatus> {
    let record = ensure_exists(tx, collection_id)?;
    Ok(crate::types::CollectionStatus {
        schema_version: record.schema_version,
        term: record.term,
        last_seq: record.last_seq,
        last_row_version: record.last_row_version,
    })
}

pub(crate) fn touch(
    tx: &TxHandle,
    record: &CollectionRecord,
    term: i64,
    last_seq: i64,
    last_row_version: i64,
) -> Result<()> {
    tx.run(
        "UPDATE _tsdb_collection SET term = ?, last_seq = ?, last_row_version = ?, updated_at = ? WHERE collection_id = ?",
        &[
            SqlValue::Integer(term),
            SqlValue::Integer(last_seq),
            SqlValue::Integer(last_row_version),
            SqlValue::Integer(now_millis()),
            SqlValue::Text(record.collection_id.clone()),
        ],
    )?;
    Ok(())
}
