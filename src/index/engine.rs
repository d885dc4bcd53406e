use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use super::{IndexDiff, IndexTarget};
use crate::error::{Error, Result};
use crate::model::Record;
use crate::store::quote_ident;
use crate::types::{PropMap, Value};

/// Brings every index group of `record` up to date. Returns the owner
/// columns written by field indices so the caller can refresh the record.
pub(crate) fn maintain(conn: &Connection, record: &Record) -> Result<Vec<(String, Value)>> {
    let id = record.id().ok_or(Error::NotPersisted)?;
    let mut fields = Vec::new();

    for (name, group) in record.schema().index_groups() {
        let current = group.current_indices(record);
        match &group.target {
            IndexTarget::Custom(indexer) => {
                indexer.set_property_index(conn, record, &current)?;
                debug!(group = %name, id, entries = current.len(), "custom index updated");
            }
            IndexTarget::Field(field) => {
                let value = current
                    .values()
                    .find(|v| !v.is_blank())
                    .cloned()
                    .unwrap_or_default();
                let sql = format!(
                    "UPDATE {} SET {} = ?1 WHERE \"id\" = ?2",
                    quote_ident(record.model().table()),
                    quote_ident(field)
                );
                conn.execute(&sql, params![value, id])?;
                fields.push((field.clone(), value));
            }
            IndexTarget::Table(group_name) => {
                let diff = write_table(conn, record, group_name, &current)?;
                if !diff.is_empty() {
                    debug!(
                        group = %name,
                        id,
                        inserted = diff.insert.len(),
                        updated = diff.update.len(),
                        deleted = diff.delete.len(),
                        "index updated"
                    );
                }
            }
        }
    }
    Ok(fields)
}

/// Entries currently stored for `record` in a group table.
pub(crate) fn stored_indices(conn: &Connection, record: &Record, group: &str) -> Result<PropMap> {
    let model = record.model();
    let table = model.index_table_name(group);
    let (predicate, params) = model.index_reader(record, group).predicate();
    let sql = format!(
        "SELECT \"key\", \"value\" FROM {} WHERE {predicate}",
        quote_ident(&table)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Value>(1)?))
    })?;
    Ok(rows.collect::<rusqlite::Result<PropMap>>()?)
}

fn write_table(
    conn: &Connection,
    record: &Record,
    group: &str,
    current: &PropMap,
) -> Result<IndexDiff> {
    let model = record.model();
    let table = quote_ident(&model.index_table_name(group));
    let old = stored_indices(conn, record, group)?;
    let diff = IndexDiff::compute(&old, current);
    let (predicate, scope_params) = model.index_reader(record, group).predicate();

    for key in &diff.update {
        let sql = format!("UPDATE {table} SET \"value\" = ? WHERE {predicate} AND \"key\" = ?");
        let mut values = Vec::with_capacity(scope_params.len() + 2);
        values.push(current.get(key).cloned().unwrap_or_default());
        values.extend(scope_params.iter().cloned());
        values.push(Value::from(key.as_str()));
        conn.execute(&sql, params_from_iter(values.iter()))?;
    }

    if !diff.delete.is_empty() {
        let marks = vec!["?"; diff.delete.len()].join(", ");
        let sql = format!("DELETE FROM {table} WHERE {predicate} AND \"key\" IN ({marks})");
        let values = scope_params
            .iter()
            .cloned()
            .chain(diff.delete.iter().map(|key| Value::from(key.as_str())));
        conn.execute(&sql, params_from_iter(values))?;
    }

    if !diff.insert.is_empty() {
        insert_entries(conn, record, group, &table, &diff.insert, current)?;
    }

    Ok(diff)
}

/// Inserts all new entries in one statement, one row per writer scope
/// combination and key.
fn insert_entries(
    conn: &Connection,
    record: &Record,
    group: &str,
    table: &str,
    keys: &[String],
    current: &PropMap,
) -> Result<()> {
    let writer = record.model().index_writer(record, group);
    let columns: Vec<String> = writer
        .columns()
        .map(quote_ident)
        .chain(["\"key\"".to_string(), "\"value\"".to_string()])
        .collect();

    let mut tuples = Vec::new();
    let mut values = Vec::new();
    for row in writer.rows() {
        let marks = format!("({})", vec!["?"; row.len() + 2].join(", "));
        for key in keys {
            tuples.push(marks.clone());
            values.extend(row.iter().cloned());
            values.push(Value::from(key.as_str()));
            values.push(current.get(key).cloned().unwrap_or_default());
        }
    }
    if tuples.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {}",
        columns.join(", "),
        tuples.join(", ")
    );
    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(())
}

/// Removes every index entry of `record`.
pub(crate) fn destroy(conn: &Connection, record: &Record) -> Result<()> {
    let id = record.id().ok_or(Error::NotPersisted)?;
    let model = record.model();

    for (name, group) in record.schema().index_groups() {
        match &group.target {
            IndexTarget::Custom(indexer) => indexer.delete_property_index(conn, record)?,
            IndexTarget::Field(_) => {}
            IndexTarget::Table(group_name) => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    quote_ident(&model.index_table_name(group_name)),
                    quote_ident(model.foreign_key())
                );
                let deleted = conn.execute(&sql, params![id])?;
                debug!(group = %name, id, deleted, "index entries removed");
            }
        }
    }
    Ok(())
}
