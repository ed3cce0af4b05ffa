//! Key-value store abstraction: typed CRUD, secondary-index queries,
//! conditional updates, pagination, retry-with-backoff, and a read-through
//! cache wrapper.

pub mod cache;
pub mod memory;
pub mod retry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, ErrorKind};
use crate::models::Id;

/// One secondary-index entry to maintain alongside a record: `index` names
/// the logical GSI (e.g. `"userId"`, `"accountId_statusDate"`), `key` is the
/// sort-key value records with the same `index` are queried by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub index: String,
    pub key: String,
}

impl IndexKey {
    pub fn new(index: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pagination {
    /// Opaque cursor returned by a previous call; `None` starts from the
    /// beginning.
    pub cursor: Option<String>,
    pub limit: usize,
}

impl Pagination {
    pub fn first(limit: usize) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Erased key-value store over JSON values. Concrete record types are
/// layered on top via the typed helpers below; one trait spans all entity
/// kinds rather than a trait per entity.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, table: &str, id: &Id) -> Result<Option<Value>, CoreError>;

    async fn put(&self, table: &str, id: &Id, value: Value, indexes: Vec<IndexKey>) -> Result<(), CoreError>;

    /// Writes only if the record's current existence matches
    /// `expect_exists`; returns `Ok(false)` without writing on a mismatch
    /// (lost-update protection for concurrent writers on the same key).
    async fn conditional_put(
        &self,
        table: &str,
        id: &Id,
        expect_exists: bool,
        value: Value,
        indexes: Vec<IndexKey>,
    ) -> Result<bool, CoreError>;

    async fn delete(&self, table: &str, id: &Id) -> Result<(), CoreError>;

    /// Query `table` by secondary index `index`, returning records whose
    /// index key starts with `prefix`, in key order.
    async fn query_index(
        &self,
        table: &str,
        index: &str,
        prefix: &str,
        pagination: Pagination,
    ) -> Result<Page<Value>, CoreError>;

    async fn scan(&self, table: &str, pagination: Pagination) -> Result<Page<Value>, CoreError>;
}

/// Typed `get`: deserializes the raw JSON record, treating malformed stored
/// data as a permanent decode error (it should never happen from records
/// this crate itself wrote, but a foreign writer sharing the table could).
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn Store,
    table: &str,
    id: &Id,
) -> Result<Option<T>, CoreError> {
    match store.get(table, id).await? {
        Some(value) => {
            let typed = serde_json::from_value(value)
                .map_err(|err| CoreError::new(ErrorKind::PermanentDecode, format!("corrupt record in {table}: {err}")))?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

pub async fn put_typed<T: Serialize + Sync>(
    store: &dyn Store,
    table: &str,
    id: &Id,
    record: &T,
    indexes: Vec<IndexKey>,
) -> Result<(), CoreError> {
    let value = serde_json::to_value(record)
        .map_err(|err| CoreError::new(ErrorKind::PermanentDecode, format!("failed to serialize record: {err}")))?;
    store.put(table, id, value, indexes).await
}

pub async fn query_index_typed<T: DeserializeOwned>(
    store: &dyn Store,
    table: &str,
    index: &str,
    prefix: &str,
    pagination: Pagination,
) -> Result<Page<T>, CoreError> {
    let page = store.query_index(table, index, prefix, pagination).await?;
    let items = page
        .items
        .into_iter()
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|err| CoreError::new(ErrorKind::PermanentDecode, format!("corrupt record in {table}: {err}")))
        })
        .collect::<Result<Vec<T>, CoreError>>()?;
    Ok(Page {
        items,
        next_cursor: page.next_cursor,
    })
}
