use crate::types::{PropMap, Value};

/// Writes needed to turn the stored entries of a group into the current ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDiff {
    pub insert: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
}

impl IndexDiff {
    /// Values are compared as stored, so `34` equals a stored `34` and a
    /// datetime equals its stored text.
    pub fn compute(old: &PropMap, current: &PropMap) -> Self {
        let mut diff = Self::default();

        for (key, value) in current {
            match old.get(key) {
                None if !value.is_blank() => diff.insert.push(key.clone()),
                None => {}
                Some(_) if value.is_blank() => diff.delete.push(key.clone()),
                Some(stored) if !same(stored, value) => diff.update.push(key.clone()),
                Some(_) => {}
            }
        }
        diff.delete.extend(
            old.keys()
                .filter(|key| !current.contains_key(key.as_str()))
                .cloned(),
        );
        diff.delete.sort();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

fn same(stored: &Value, current: &Value) -> bool {
    stored.to_sql_value() == current.to_sql_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn map(pairs: &[(&str, Value)]) -> PropMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_new_keys_are_inserted_unless_blank() {
        let diff = IndexDiff::compute(
            &PropMap::new(),
            &map(&[("age", 34.into()), ("name", "".into())]),
        );
        assert_eq!(diff.insert, vec!["age"]);
        assert!(diff.update.is_empty());
        assert!(diff.delete.is_empty());
    }

    #[test]
    fn test_changed_values_are_updated() {
        let diff = IndexDiff::compute(
            &map(&[("age", 34.into()), ("name", "Juan".into())]),
            &map(&[("age", 17.into()), ("name", "Juan".into())]),
        );
        assert_eq!(diff.update, vec!["age"]);
        assert!(diff.insert.is_empty());
        assert!(diff.delete.is_empty());
    }

    #[test]
    fn test_blank_or_missing_keys_are_deleted() {
        let diff = IndexDiff::compute(
            &map(&[("age", 34.into()), ("name_es", "Juan".into()), ("high", "x".into())]),
            &map(&[("age", Value::Null), ("name_en", "John".into()), ("high", "y".into())]),
        );
        assert_eq!(diff.delete, vec!["age", "name_es"]);
        assert_eq!(diff.insert, vec!["name_en"]);
        assert_eq!(diff.update, vec!["high"]);
    }

    #[test]
    fn test_stored_representation_is_compared() {
        let at = Utc.with_ymd_and_hms(2010, 2, 10, 21, 21, 0).unwrap();
        let diff = IndexDiff::compute(
            &map(&[("born", "2010-02-10 21:21:00".into()), ("ok", 1.into())]),
            &map(&[("born", at.into()), ("ok", true.into())]),
        );
        assert!(diff.is_empty());
    }
}
