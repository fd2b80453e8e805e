//! Persistence adapter (C3): schema bootstrap, `loadSubset`,
//! `applyCommittedTx`, `ensureIndex`/`markIndexRemoved`, `pullSince`. Built
//! as free functions over `&SqliteDriver` plus typed argument structs
//! rather than a single adapter trait object.

mod clock;
mod index;
mod predicate;
mod rows;
mod schema;
mod types;

pub use predicate::Predicate;
pub use types::{
    CollectionStatus, CommittedTx, IndexSpec, KeyValueRow, LoadSubsetOptions, Mutation, MutationKind, OrderBy,
    PullSinceResult,
};

use tsdb_config::validate_collection_id;
use tsdb_driver::{SqlValue, SqliteDriver};
use tsdb_errors::{Result, TsdbError, UnsupportedError};

use crate::clock::now_millis;

/// Opens or creates the collection record, validates `schemaVersion` per
/// the configured policy, evaluates `options.where_clause`/`order_by`/
/// `limit`, and returns matching rows in caller order. Never mutates rows
/// (a policy-driven reset is metadata bookkeeping, not a row mutation in
/// its own right, and happens inside the same transaction as the version
/// check before any `SELECT` runs).
pub async fn load_subset(
    driver: &SqliteDriver,
    collection_id: &str,
    options: &LoadSubsetOptions,
) -> Result<Vec<KeyValueRow>> {
    validate_collection_id(collection_id)?;
    schema::bootstrap(driver).await?;

    let collection_id_owned = collection_id.to_string();
    let schema_version = options.schema_version;
    let policy = options.policy;
    let record = driver
        .transaction(move |tx| schema::ensure_checked(tx, &collection_id_owned, schema_version, policy))
        .await?;

    tracing::debug!(collection_id, schema_version, term = record.term, "load_subset: collection ready");

    // limit=0 is a schema-check probe: the version check above already ran,
    // nothing left to do.
    if options.limit == Some(0) {
        return Ok(Vec::new());
    }

    let mut sql = format!("SELECT key, value FROM {}", record.rows_table);
    let mut params = Vec::new();
    if let Some(predicate) = &options.where_clause {
        let compiled = predicate::compile(predicate)?;
        sql.push_str(" WHERE ");
        sql.push_str(&compiled.sql);
        params = compiled.params;
    }
    if let Some(order_by) = &options.order_by {
        let column = predicate::field_sql(&order_by.field)?;
        sql.push_str(&format!(
            " ORDER BY {column} {}",
            if order_by.descending { "DESC" } else { "ASC" }
        ));
    }
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let raw_rows: Vec<(String, String)> = driver
        .query(&sql, params, |row| Ok((row.get(0)?, row.get(1)?)))
        .await?;

    raw_rows
        .into_iter()
        .map(|(key_encoded, value_text)| {
            let key = tsdb_keys::decode(&key_encoded)?;
            let value = serde_json::from_str(&value_text)?;
            Ok(KeyValueRow { key, value })
        })
        .collect()
}

/// Applies `tx` inside `driver.transaction`. Rejects stale/duplicate
/// `(term, seq)` with [`TsdbError::StaleTransaction`] — callers treat that
/// specific error as a no-op, which is what makes replay idempotent.
pub async fn apply_committed_tx(driver: &SqliteDriver, collection_id: &str, tx: &CommittedTx) -> Result<()> {
    validate_collection_id(collection_id)?;
    schema::bootstrap(driver).await?;

    let collection_id = collection_id.to_string();
    let tx = tx.clone();

    driver
        .transaction(move |handle| {
            let record = schema::ensure_exists(handle, &collection_id)?;

            if tx.term < record.term || (tx.term == record.term && tx.seq <= record.last_seq) {
                return Err(TsdbError::StaleTransaction {
                    term: tx.term,
                    seq: tx.seq,
                    current_term: record.term,
                    current_seq: record.last_seq,
                });
            }

            let now = now_millis();
            for mutation in &tx.mutations {
                let key_encoded = tsdb_keys::encode(&mutation.key)?;
                match mutation.kind {
                    MutationKind::Insert | MutationKind::Update => {
                        let value = mutation.value.as_ref().ok_or_else(|| {
                            TsdbError::from(UnsupportedError(
                                "insert/update mutation is missing a value".to_string(),
                            ))
                        })?;
                        let value_json = serde_json::to_string(value)?;
                        rows::upsert_row(handle, &record.rows_table, &key_encoded, &value_json, tx.row_version, now)?;
                    }
                    MutationKind::Delete => {
                        rows::delete_row_and_tombstone(
                            handle,
                            &record.rows_table,
                            &record.tomb_table,
                            &key_encoded,
                            tx.row_version,
                            now,
                        )?;
                    }
                }
            }

            let last_row_version = record.last_row_version.max(tx.row_version);
            schema::touch(handle, &record, tx.term, tx.seq, last_row_version)?;
            tracing::info!(
                collection_id = %record.collection_id,
                term = tx.term,
                seq = tx.seq,
                row_version = tx.row_version,
                mutation_count = tx.mutations.len(),
                "applied committed tx"
            );
            Ok(())
        })
        .await
}

pub async fn ensure_index(driver: &SqliteDriver, collection_id: &str, signature: &str, spec: &IndexSpec) -> Result<()> {
    validate_collection_id(collection_id)?;
    index::ensure_index(driver, collection_id, signature, spec).await
}

pub async fn mark_index_removed(driver: &SqliteDriver, collection_id: &str, signature: &str) -> Result<()> {
    validate_collection_id(collection_id)?;
    index::mark_index_removed(driver, collection_id, signature).await
}

/// Point-in-time `(schemaVersion, term, lastSeq, lastRowVersion)` for a
/// collection, creating its record (unversioned) if this is the first
/// reference. The persisted-collection wrapper (C5) uses this to seed its
/// `(term, seq)` gap-detection watermark at hydration time without
/// re-deriving it by replaying rows.
pub async fn collection_status(driver: &SqliteDriver, collection_id: &str) -> Result<CollectionStatus> {
    validate_collection_id(collection_id)?;
    schema::bootstrap(driver).await?;
    let collection_id = collection_id.to_string();
    driver.transaction(move |tx| schema::status(tx, &collection_id)).await
}

/// Returns keys changed or deleted since `from_row_version`. A collection
/// that was reset after `from_row_version` was captured (so its
/// `last_row_version` is now lower than what the caller already has) can
/// never be satisfied by `changed_keys`/`deleted_keys` alone, so that case
/// sets `requires_full_reload` instead of returning an empty, misleadingly
/// "up to date" delta. Tombstones are retained indefinitely (no compaction
/// in this adapter), so that is the only trigger for a full reload here.
pub async fn pull_since(driver: &SqliteDriver, collection_id: &str, from_row_version: i64) -> Result<PullSinceResult> {
    validate_collection_id(collection_id)?;
    schema::bootstrap(driver).await?;

    let collection_id = collection_id.to_string();
    driver
        .transaction(move |tx| {
            let record = schema::ensure_exists(tx, &collection_id)?;
            let requires_full_reload = from_row_version > record.last_row_version;

            let changed: Vec<String> = tx.query(
                &format!(
                    "SELECT key FROM {} WHERE row_version > ? ORDER BY row_version ASC",
                    record.rows_table
                ),
                &[SqlValue::Integer(from_row_version)],
                |row| row.get(0),
            )?;
            let deleted: Vec<String> = tx.query(
                &format!(
                    "SELECT key FROM {} WHERE deleted_at_row_version > ? ORDER BY deleted_at_row_version ASC",
                    record.tomb_table
                ),
                &[SqlValue::Integer(from_row_version)],
                |row| row.get(0),
            )?;

            let changed_keys = changed
                .into_iter()
                .map(|k| tsdb_keys::decode(&k))
                .collect::<Result<Vec<_>>>()?;
            let deleted_keys = deleted
                .into_iter()
                .map(|k| tsdb_keys::decode(&k))
                .collect::<Result<Vec<_>>>()?;

            Ok(PullSinceResult {
                latest_row_version: record.last_row_version,
                requires_full_reload,
                changed_keys,
                deleted_keys,
            })
        })
        .await
}
