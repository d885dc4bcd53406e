use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::debug;

use super::Store;
use super::schema::{self, quote_ident};
use crate::error::{Error, Result};
use crate::index::{self, IndexTarget};
use crate::model::{Model, Record};
use crate::types::{PropMap, Value};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn existing_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Writes the row inside one transaction, running the save hook first.
/// Index groups are maintained in the same transaction when `with_indices`.
fn write_record(
    conn: &mut Connection,
    record: &mut Record,
    dirty: bool,
    with_indices: bool,
) -> Result<Vec<(String, Value)>> {
    let model = record.model().clone();
    let tx = conn.transaction()?;

    if let Some(hook) = model.before_save() {
        hook(&*record)?;
    }

    let table = quote_ident(model.table());
    let properties_column = quote_ident(&model.settings().properties_column);
    let attributes = model.attributes();

    match record.id() {
        None => {
            let mut columns: Vec<String> = attributes.iter().map(|a| quote_ident(a)).collect();
            let mut values: Vec<Value> = attributes
                .iter()
                .map(|a| record.attribute(a).cloned().unwrap_or_default())
                .collect();
            columns.push(properties_column);
            values.push(record.raw_properties().map(str::to_string).into());

            let marks = vec!["?"; values.len()].join(", ");
            tx.execute(
                &format!("INSERT INTO {table} ({}) VALUES ({marks})", columns.join(", ")),
                params_from_iter(values.iter()),
            )?;
            record.set_id(Some(tx.last_insert_rowid()));
        }
        Some(id) => {
            let mut sets: Vec<String> = attributes
                .iter()
                .map(|a| format!("{} = ?", quote_ident(a)))
                .collect();
            let mut values: Vec<Value> = attributes
                .iter()
                .map(|a| record.attribute(a).cloned().unwrap_or_default())
                .collect();
            if dirty {
                sets.push(format!("{properties_column} = ?"));
                values.push(record.raw_properties().map(str::to_string).into());
            }
            if !sets.is_empty() {
                values.push(Value::from(id));
                tx.execute(
                    &format!("UPDATE {table} SET {} WHERE \"id\" = ?", sets.join(", ")),
                    params_from_iter(values.iter()),
                )?;
            }
        }
    }

    let fields = if with_indices {
        index::maintain(&tx, record)?
    } else {
        Vec::new()
    };
    tx.commit()?;
    Ok(fields)
}

fn maintain_in_transaction(conn: &mut Connection, record: &Record) -> Result<Vec<(String, Value)>> {
    let tx = conn.transaction()?;
    let fields = index::maintain(&tx, record)?;
    tx.commit()?;
    Ok(fields)
}

impl Store for SqliteStore {
    fn install(&self, model: &Model) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(&schema::host_table(model))?;

        // Subtypes share the parent's table and may bring extra columns.
        let existing = existing_columns(&conn, model.table())?;
        for column in schema::host_columns(model) {
            if !existing.contains(&column) {
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote_ident(model.table()),
                    quote_ident(&column)
                ))?;
            }
        }

        for group in model.schema().index_groups().into_values() {
            if let IndexTarget::Table(name) = &group.target {
                conn.execute_batch(&schema::index_table(model, name))?;
            }
        }
        debug!(model = %model.name(), table = %model.table(), "installed tables");
        Ok(())
    }

    fn save(&self, record: &mut Record) -> Result<bool> {
        if !record.is_valid()? {
            debug!(
                model = %record.model().name(),
                errors = record.errors().len(),
                "record is invalid, not saved"
            );
            return Ok(false);
        }

        let dirty = record.dump_properties()?;
        let was_new = record.is_new_record();
        let defer = record.model().settings().defer_index_writes;

        let mut conn = self.conn();
        let fields = match write_record(&mut conn, record, dirty, !defer) {
            Ok(fields) => fields,
            Err(e) => {
                if was_new {
                    record.set_id(None);
                }
                return Err(e);
            }
        };
        record.properties_persisted();

        let fields = if defer {
            maintain_in_transaction(&mut conn, record)?
        } else {
            fields
        };
        for (field, value) in fields {
            record.store_attribute(field, value);
        }

        debug!(model = %record.model().name(), id = ?record.id(), dirty, "record saved");
        Ok(true)
    }

    fn destroy(&self, record: &mut Record) -> Result<bool> {
        let Some(id) = record.id() else {
            return Ok(false);
        };
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        index::destroy(&tx, record)?;
        let rows = tx.execute(
            &format!("DELETE FROM {} WHERE \"id\" = ?1", quote_ident(record.model().table())),
            params![id],
        )?;
        tx.commit()?;

        debug!(model = %record.model().name(), id, "record destroyed");
        Ok(rows > 0)
    }

    fn find(&self, model: &Arc<Model>, id: i64) -> Result<Option<Record>> {
        let columns = schema::host_columns(model);
        let selected: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let sql = format!(
            "SELECT {}{} FROM {} WHERE \"id\" = ?1",
            selected.iter().map(|c| format!("{c}, ")).collect::<String>(),
            quote_ident(&model.settings().properties_column),
            quote_ident(model.table())
        );

        let conn = self.conn();
        conn.query_row(&sql, params![id], |row| {
            let mut attributes = PropMap::new();
            for (i, name) in columns.iter().enumerate() {
                let value: Value = row.get(i)?;
                if !value.is_null() {
                    attributes.insert(name.clone(), value);
                }
            }
            let raw: Option<String> = row.get(columns.len())?;
            Ok(Record::from_row(model, id, attributes, raw))
        })
        .optional()
        .map_err(Error::from)
    }

    fn rebuild_index(&self, record: &mut Record) -> Result<()> {
        if record.is_new_record() {
            return Err(Error::NotPersisted);
        }
        let fields = maintain_in_transaction(&mut self.conn(), record)?;
        for (field, value) in fields {
            record.store_attribute(field, value);
        }
        debug!(model = %record.model().name(), id = ?record.id(), "index rebuilt");
        Ok(())
    }

    fn index_entries(&self, record: &Record, group: &str) -> Result<PropMap> {
        if record.is_new_record() {
            return Ok(PropMap::new());
        }
        index::stored_indices(&self.conn(), record, group)
    }

    fn find_by_index(
        &self,
        model: &Model,
        group: &str,
        key: &str,
        value: &Value,
    ) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT DISTINCT {fk} FROM {table} WHERE \"key\" = ?1 AND \"value\" = ?2 ORDER BY {fk}",
            fk = quote_ident(model.foreign_key()),
            table = quote_ident(&model.index_table_name(group)),
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params![key, value], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnOptions;
    use tempfile::TempDir;

    fn employee() -> Arc<Model> {
        let model = Model::builder("Employee")
            .attributes(["first_name", "last_name"])
            .build();
        model
            .property()
            .string("nick", ColumnOptions::new().indexed())
            .unwrap();
        model
    }

    #[test]
    fn test_install_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.install(&employee()).unwrap();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"employees".to_string()));
        assert!(tables.contains(&"i_string_employees".to_string()));
    }

    #[test]
    fn test_install_adds_subtype_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let employee = employee();
        let developer = Model::builder("Developer")
            .parent(&employee)
            .attribute("language_level")
            .build();
        store.install(&employee).unwrap();
        store.install(&developer).unwrap();

        let columns = existing_columns(&store.conn(), "employees").unwrap();
        assert!(columns.contains(&"language_level".to_string()));
    }

    #[test]
    fn test_save_and_find() {
        let store = SqliteStore::open_in_memory().unwrap();
        let model = employee();
        store.install(&model).unwrap();

        let mut record = model.new_record();
        record.set_attribute("first_name", "Eric").unwrap();
        record.set_prop("nick", "ric").unwrap();
        assert!(store.save(&mut record).unwrap());
        let id = record.id().unwrap();

        let found = store.find(&model, id).unwrap().unwrap();
        assert_eq!(found.attribute("first_name"), Some(&Value::from("Eric")));
        assert_eq!(found.prop("nick"), Some(&Value::from("ric")));
        assert_eq!(
            store.find_by_index(&model, "string", "nick", &Value::from("ric")).unwrap(),
            vec![id]
        );
        assert!(store.find(&model, id + 1).unwrap().is_none());
    }

    #[test]
    fn test_unchanged_properties_are_not_rewritten() {
        let store = SqliteStore::open_in_memory().unwrap();
        let model = employee();
        store.install(&model).unwrap();

        let mut record = model.new_record();
        record.set_prop("nick", "ric").unwrap();
        store.save(&mut record).unwrap();
        let id = record.id().unwrap();

        store
            .conn()
            .execute(
                "UPDATE employees SET properties = '{\"nick\":\"raw\"}' WHERE id = ?1",
                params![id],
            )
            .unwrap();
        record.set_attribute("last_name", "Satie").unwrap();
        store.save(&mut record).unwrap();

        let found = store.find(&model, id).unwrap().unwrap();
        assert_eq!(found.prop("nick"), Some(&Value::from("raw")));
        assert_eq!(found.attribute("last_name"), Some(&Value::from("Satie")));
    }
}
