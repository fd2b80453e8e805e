use tsdb_driver::{SqlValue, SqliteDriver, TxHandle};
use tsdb_errors::Result;
use tsdb_keys::safe_identifier;

use crate::clock::now_millis;
use crate::predicate::field_sql;
use crate::schema;
use crate::types::IndexSpec;

fn physical_index_name(collection_id: &str, signature: &str) -> String {
    safe_identifier(&format!("{collection_id}:{signature}"), 'i')
}

fn fetch_state(tx: &TxHandle, collection_id: &str, signature: &str) -> Result<Option<String>> {
    let rows = tx.query(
        "SELECT state FROM _tsdb_index WHERE collection_id = ? AND signature = ?",
        &[
            SqlValue::Text(collection_id.to_string()),
            SqlValue::Text(signature.to_string()),
        ],
        |row| row.get::<_, String>(0),
    )?;
    Ok(rows.into_iter().next())
}

pub(crate) async fn ensure_index(
    driver: &SqliteDriver,
    collection_id: &str,
    signature: &str,
    spec: &IndexSpec,
) -> Result<()> {
    schema::bootstrap(driver).await?;
    let collection_id = collection_id.to_string();
    let signature = signature.to_string();
    let spec_json = serde_json::to_string(spec)?;
    let columns = spec
        .fields
        .iter()
        .map(|field| field_sql(field))
        .collect::<Result<Vec<_>>>()?;

    driver
        .transaction(move |tx| {
            let record = schema::ensure_exists(tx, &collection_id)?;
            if fetch_state(tx, &collection_id, &signature)?.as_deref() == Some("active") {
                return Ok(());
            }

            let index_name = physical_index_name(&collection_id, &signature);
            tx.exec(&format!(
                "CREATE INDEX IF NOT EXISTS {index_name} ON {} ({})",
                record.rows_table,
                columns.join(", ")
            ))?;

            tx.run(
                "INSERT INTO _tsdb_index (collection_id, signature, spec, state, created_at) \
                 VALUES (?, ?, ?, 'active', ?) \
                 ON CONFLICT(collection_id, signature) DO UPDATE SET spec = excluded.spec, state = 'active'",
                &[
                    SqlValue::Text(collection_id.clone()),
                    SqlValue::Text(signature.clone()),
                    SqlValue::Text(spec_json.clone()),
                    SqlValue::Integer(now_millis()),
                ],
            )?;
            Ok(())
        })
        .await
}

pub(crate) async fn mark_index_removed(
    driver: &SqliteDriver,
    collection_id: &str,
    signature: &str,
) -> Result<()> {
    schema::bootstrap(driver).await?;
    let collection_id = collection_id.to_string();
    let signature = signature.to_string();

    driver
        .transaction(move |tx| {
            schema::ensure_exists(tx, &collection_id)?;
            match fetch_state(tx, &collection_id, &signature)? {
                None => return Ok(()),
                Some(state) if state == "removed" => return Ok(()),
                Some(_) => {}
            }

            let index_name = physical_index_name(&collection_id, &signature);
            tx.exec(&format!("DROP INDEX IF EXISTS {index_name}"))?;
            tx.run(
                "UPDATE _tsdb_index SET state = 'removed' WHERE collection_id = ? AND signature = ?",
                &[SqlValue::Text(collection_id.clone()), SqlValue::Text(signature.clone())],
            )?;
            Ok(())
        })
        .await
}
