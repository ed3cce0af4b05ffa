use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{IndexKey, Page, Pagination, Store};
use crate::error::CoreError;
use crate::models::Id;

#[derive(Default)]
struct Table {
    records: HashMap<String, Value>,
    /// index name -> sort key -> ids in insertion order at that key.
    indexes: HashMap<String, BTreeMap<String, Vec<String>>>,
}

impl Table {
    fn remove_from_indexes(&mut self, id: &str) {
        for sort_map in self.indexes.values_mut() {
            for ids in sort_map.values_mut() {
                ids.retain(|existing| existing != id);
            }
        }
    }

    fn apply_indexes(&mut self, id: &str, indexes: Vec<IndexKey>) {
        self.remove_from_indexes(id);
        for entry in indexes {
            self.indexes
                .entry(entry.index)
                .or_default()
                .entry(entry.key)
                .or_default()
                .push(id.to_string());
        }
    }
}

/// In-memory reference `Store`: one `Mutex`-guarded map per logical table,
/// used by both the test suite and the demo binary.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, table: &str, id: &Id) -> Result<Option<Value>, CoreError> {
        let tables = self.tables.lock().expect("memory store lock poisoned");
        Ok(tables
            .get(table)
            .and_then(|t| t.records.get(id.as_str()))
            .cloned())
    }

    async fn put(&self, table: &str, id: &Id, value: Value, indexes: Vec<IndexKey>) -> Result<(), CoreError> {
        let mut tables = self.tables.lock().expect("memory store lock poisoned");
        let entry = tables.entry(table.to_string()).or_default();
        entry.records.insert(id.as_str().to_string(), value);
        entry.apply_indexes(id.as_str(), indexes);
        Ok(())
    }

    async fn conditional_put(
        &self,
        table: &str,
        id: &Id,
        expect_exists: bool,
        value: Value,
        indexes: Vec<IndexKey>,
    ) -> Result<bool, CoreError> {
        let mut tables = self.tables.lock().expect("memory store lock poisoned");
        let entry = tables.entry(table.to_string()).or_default();
        let exists = entry.records.contains_key(id.as_str());
        if exists != expect_exists {
            return Ok(false);
        }
        entry.records.insert(id.as_str().to_string(), value);
        entry.apply_indexes(id.as_str(), indexes);
        Ok(true)
    }

    async fn delete(&self, table: &str, id: &Id) -> Result<(), CoreError> {
        let mut tables = self.tables.lock().expect("memory store lock poisoned");
        if let Some(entry) = tables.get_mut(table) {
            entry.records.remove(id.as_str());
            entry.remove_from_indexes(id.as_str());
        }
        Ok(())
    }

    async fn query_index(
        &self,
        table: &str,
        index: &str,
        prefix: &str,
        pagination: Pagination,
    ) -> Result<Page<Value>, CoreError> {
        let tables = self.tables.lock().expect("memory store lock poisoned");
        let Some(entry) = tables.get(table) else {
            return Ok(Page {
                items: Vec::new(),
                next_cursor: None,
            });
        };
        let Some(sort_map) = entry.indexes.get(index) else {
            return Ok(Page {
                items: Vec::new(),
                next_cursor: None,
            });
        };

        let ids: Vec<&String> = sort_map
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .flat_map(|(_, ids)| ids.iter())
            .collect();

        let start = pagination
            .cursor
            .as_ref()
            .and_then(|cursor| ids.iter().position(|id| id.as_str() == cursor.as_str()))
            .map(|pos| pos + 1)
            .unwrap_or(0);

        let limit = if pagination.limit == 0 {
            ids.len()
        } else {
            pagination.limit
        };

        let end = (start + limit).min(ids.len());
        let page_ids = &ids[start..end];
        let next_cursor = if end < ids.len() {
            page_ids.last().map(|id| id.to_string())
        } else {
            None
        };

        let items = page_ids
            .iter()
            .filter_map(|id| entry.records.get(id.as_str()).cloned())
            .collect();

        Ok(Page { items, next_cursor })
    }

    async fn scan(&self, table: &str, pagination: Pagination) -> Result<Page<Value>, CoreError> {
        let tables = self.tables.lock().expect("memory store lock poisoned");
        let Some(entry) = tables.get(table) else {
            return Ok(Page {
                items: Vec::new(),
                next_cursor: None,
            });
        };

        let mut keys: Vec<&String> = entry.records.keys().collect();
        keys.sort();

        let start = pagination
            .cursor
            .as_ref()
            .and_then(|cursor| keys.iter().position(|k| k.as_str() == cursor.as_str()))
            .map(|pos| pos + 1)
            .unwrap_or(0);
        let limit = if pagination.limit == 0 {
            keys.len()
        } else {
            pagination.limit
        };
        let end = (start + limit).min(keys.len());
        let page_keys: Vec<&String> = keys[start..end].to_vec();
        let next_cursor = if end < keys.len() {
            page_keys.last().map(|k| k.to_string())
        } else {
            None
        };

        let items = page_keys
            .into_iter()
            .filter_map(|k| entry.records.get(k.as_str()).cloned())
            .collect();

        Ok(Page { items, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = MemoryStore::new();
        let id = Id::from_string("account-1");
        store.put("accounts", &id, json!({"name": "Checking"}), vec![]).await.unwrap();
        let value = store.get("accounts", &id).await.unwrap().unwrap();
        assert_eq!(value["name"], "Checking");
    }

    #[tokio::test]
    async fn conditional_put_rejects_mismatched_expectation() {
        let store = MemoryStore::new();
        let id = Id::from_string("account-1");
        let ok = store
            .conditional_put("accounts", &id, false, json!({"v": 1}), vec![])
            .await
            .unwrap();
        assert!(ok);
        let rejected = store
            .conditional_put("accounts", &id, false, json!({"v": 2}), vec![])
            .await
            .unwrap();
        assert!(!rejected);
    }

    #[tokio::test]
    async fn query_index_filters_by_prefix_in_key_order() {
        let store = MemoryStore::new();
        for (id, key) in [("tx-1", "new#100"), ("tx-2", "new#200"), ("tx-3", "duplicate#50")] {
            store
                .put(
                    "transactions",
                    &Id::from_string(id),
                    json!({"id": id}),
                    vec![IndexKey::new("accountId_statusDate", key)],
                )
                .await
                .unwrap();
        }
        let page = store
            .query_index("transactions", "accountId_statusDate", "new", Pagination::default())
            .await
            .unwrap();
        let ids: Vec<String> = page.items.iter().map(|v| v["id"].as_str().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["tx-1", "tx-2"]);
    }

    #[tokio::test]
    async fn delete_removes_record_and_index_entries() {
        let store = MemoryStore::new();
        let id = Id::from_string("tx-1");
        store
            .put("transactions", &id, json!({"id": "tx-1"}), vec![IndexKey::new("userId", "user-1")])
            .await
            .unwrap();
        store.delete("transactions", &id).await.unwrap();
        assert!(store.get("transactions", &id).await.unwrap().is_none());
        let page = store
            .query_index("transactions", "userId", "user-1", Pagination::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }
}
