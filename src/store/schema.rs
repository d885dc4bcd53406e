//! DDL for host tables and their index tables.
//!
//! Columns other than `id`, the properties column and the index `key` are
//! left typeless so SQLite keeps whatever type a value was bound with.

use crate::index::IndexTarget;
use crate::model::Model;

/// Quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE` statement for the host table of `model`.
pub fn host_table(model: &Model) -> String {
    let mut columns = vec!["\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    columns.extend(host_columns(model).iter().map(|c| quote_ident(c)));
    columns.push(format!(
        "{} TEXT",
        quote_ident(&model.settings().properties_column)
    ));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        quote_ident(model.table()),
        columns.join(",\n    ")
    )
}

/// Native columns of `model`, including the owner columns of field indices.
pub fn host_columns(model: &Model) -> Vec<String> {
    let mut columns = model.attributes();
    for group in model.schema().index_groups().into_values() {
        if let IndexTarget::Field(field) = group.target {
            if !columns.contains(&field) {
                columns.push(field);
            }
        }
    }
    columns
}

/// `CREATE TABLE` statement for one index group, with a lookup index on
/// `(key, value)` and one on the owner columns.
pub fn index_table(model: &Model, group: &str) -> String {
    let table = model.index_table_name(group);
    let owner: Vec<String> = model.index_columns().iter().map(|c| quote_ident(c)).collect();
    let mut columns = owner.clone();
    columns.push("\"key\" TEXT NOT NULL".to_string());
    columns.push("\"value\"".to_string());

    format!(
        "CREATE TABLE IF NOT EXISTS {table_q} (\n    {columns}\n);\n\
         CREATE INDEX IF NOT EXISTS {lookup} ON {table_q} (\"key\", \"value\");\n\
         CREATE INDEX IF NOT EXISTS {by_owner} ON {table_q} ({owner});\n",
        table_q = quote_ident(&table),
        columns = columns.join(",\n    "),
        lookup = quote_ident(&format!("{table}_key_value")),
        by_owner = quote_ident(&format!("{table}_owner")),
        owner = owner.join(", "),
    )
}
