//! The process-wide query store. One value for the whole process, shared by
//! every connection; the last write wins. This is the documented contract,
//! not an oversight: clients of a single physical reader are expected to
//! agree on what the next card should yield.

use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};

/// What to read from the next inserted card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Ignore field filtering and return everything readable.
    All,
    /// An opaque selector, interpreted as a comma-separated list of field
    /// names. `None` or an empty string means "no filter".
    Selector(Option<String>),
}

impl Default for Query {
    fn default() -> Self {
        Query::Selector(None)
    }
}

impl Query {
    /// Applies this query to the fields a read gathered.
    pub fn select(&self, fields: Map<String, Value>) -> Value {
        match self {
            Query::All | Query::Selector(None) => Value::Object(fields),
            Query::Selector(Some(selector)) => {
                let wanted: Vec<&str> = selector
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect();
                if wanted.is_empty() {
                    return Value::Object(fields);
                }
                Value::Object(
                    fields
                        .into_iter()
                        .filter(|(name, _)| wanted.contains(&name.as_str()))
                        .collect(),
                )
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryStore {
    current: RwLock<Query>,
}

impl QueryStore {
    /// Replaces the current query unconditionally. Accepts anything,
    /// including `None`, which downstream treats as "no filter".
    pub fn set(&self, query: Option<String>) {
        *self.write() = Query::Selector(query);
    }

    /// Replaces the current query with the "read all" marker.
    pub fn set_all(&self) {
        *self.write() = Query::All;
    }

    pub fn current(&self) -> Query {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Query> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("atr".to_string(), json!("3B6500"));
        map.insert("uid".to_string(), json!("04A1B2C3"));
        map.insert("device".to_string(), json!("reader 0"));
        map
    }

    #[test]
    fn last_write_wins() {
        let store = QueryStore::default();
        store.set(Some("balance".to_string()));
        store.set(None);
        store.set(Some("uid".to_string()));

        assert_eq!(store.current(), Query::Selector(Some("uid".to_string())));
    }

    #[test]
    fn set_all_overrides_any_prior_state() {
        let store = QueryStore::default();
        store.set(Some("balance".to_string()));
        store.set_all();

        assert_eq!(store.current(), Query::All);
    }

    #[test]
    fn default_is_no_filter() {
        let store = QueryStore::default();
        assert_eq!(store.current(), Query::Selector(None));
    }

    #[test]
    fn all_and_no_filter_select_everything() {
        assert_eq!(Query::All.select(fields()), Value::Object(fields()));
        assert_eq!(
            Query::Selector(None).select(fields()),
            Value::Object(fields())
        );
        assert_eq!(
            Query::Selector(Some(String::new())).select(fields()),
            Value::Object(fields())
        );
    }

    #[test]
    fn selector_filters_to_named_fields() {
        let selected = Query::Selector(Some("uid, atr".to_string())).select(fields());
        assert_eq!(selected, json!({ "atr": "3B6500", "uid": "04A1B2C3" }));
    }

    #[test]
    fn unknown_field_names_select_nothing() {
        let selected = Query::Selector(Some("balance".to_string())).select(fields());
        assert_eq!(selected, json!({}));
    }
}
