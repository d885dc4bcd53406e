use crate::store::quote_ident;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    One(Value),
    /// Matches any of the values on read, fans out to one row each on write.
    Many(Vec<Value>),
}

/// Owner columns identifying a record's rows in an index table.
///
/// The reader scope selects existing rows, the writer scope stamps new ones.
/// By default both are `<foreign key> = <owner id>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexScope {
    entries: Vec<(String, ScopeValue)>,
}

impl IndexScope {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn equals(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .push((column.into(), ScopeValue::One(value.into())));
        self
    }

    #[must_use]
    pub fn any_of<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.entries.push((column.into(), ScopeValue::Many(values)));
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(column, _)| column.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&ScopeValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SQL condition with positional parameters, and their values.
    pub fn predicate(&self) -> (String, Vec<Value>) {
        if self.entries.is_empty() {
            return ("1".to_string(), Vec::new());
        }
        let mut params = Vec::new();
        let clauses: Vec<String> = self
            .entries
            .iter()
            .map(|(column, value)| match value {
                ScopeValue::One(value) => {
                    params.push(value.clone());
                    format!("{} = ?", quote_ident(column))
                }
                ScopeValue::Many(values) if values.is_empty() => "0".to_string(),
                ScopeValue::Many(values) => {
                    params.extend(values.iter().cloned());
                    let marks = vec!["?"; values.len()].join(", ");
                    format!("{} IN ({marks})", quote_ident(column))
                }
            })
            .collect();
        (clauses.join(" AND "), params)
    }

    /// Cartesian product of the scope values, one row per combination, in
    /// column order.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let mut rows: Vec<Vec<Value>> = vec![Vec::new()];
        for (_, value) in &self.entries {
            rows = match value {
                ScopeValue::One(value) => rows
                    .into_iter()
                    .map(|mut row| {
                        row.push(value.clone());
                        row
                    })
                    .collect(),
                ScopeValue::Many(values) => values
                    .iter()
                    .flat_map(|value| {
                        rows.iter().map(move |row| {
                            let mut row = row.clone();
                            row.push(value.clone());
                            row
                        })
                    })
                    .collect(),
            };
        }
        rows
    }
}
