//! Object store abstraction: fetch/put blobs, head metadata, delete,
//! and signed-URL issuance. No network or presigning mechanics are
//! implemented here — only the interface the ingestion pipeline depends on.

pub mod memory;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub size: u64,
    pub content_type: Option<String>,
    pub user_metadata: HashMap<String, String>,
}

impl ObjectMetadata {
    /// The two user-metadata keys ingestion requires to be present on every
    /// uploaded object.
    pub fn file_id(&self) -> Option<&str> {
        self.user_metadata.get("fileid").map(String::as_str)
    }

    pub fn account_id(&self) -> Option<&str> {
        self.user_metadata.get("accountid").map(String::as_str)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Vec<u8>, CoreError>;

    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        user_metadata: HashMap<String, String>,
    ) -> Result<(), CoreError>;

    async fn head(&self, key: &str) -> Result<ObjectMetadata, CoreError>;

    async fn delete(&self, key: &str) -> Result<(), CoreError>;

    /// Returns an opaque signed-URL token valid for `expiry`. No actual
    /// network capability is implied; this is the interface contract only.
    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<String, CoreError>;
}

/// Builds the canonical upload key pattern `{userId}/{fileId}/{fileName}`.
pub fn object_key(user_id: &str, file_id: &str, file_name: &str) -> String {
    format!("{user_id}/{file_id}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_matches_the_required_layout() {
        assert_eq!(
            object_key("user-1", "file-1", "statement.csv"),
            "user-1/file-1/statement.csv"
        );
    }
}
