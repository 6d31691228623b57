//! Store capability used by the benchmark engine
//!
//! The engine only needs two operations: create an object (with a number of
//! versions) and fetch one page of a prefix listing. Backends:
//! - `mem://` : in-process [`MemoryStore`]
//! - `s3://bucket[/ignored]` : [`S3Store`] built on the AWS SDK

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use url::Url;

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::{S3Store, S3StoreOptions};

/// One page request of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    /// Collapse everything below the next separator into one common prefix
    pub delimiter: bool,
    pub max_keys: u32,
    /// Opaque continuation cursor returned by the previous page
    pub cursor: Option<String>,
    /// Extended listing returning per-object metadata
    pub metadata: bool,
    /// List every version of every key
    pub versions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Object,
    /// Grouped sub-prefix of a delimiter listing
    CommonPrefix,
    /// Delete marker of a versioned listing
    DeleteMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub key: String,
    pub kind: EntryKind,
    pub size: u64,
    pub version_id: Option<String>,
    /// Only filled by metadata listings
    pub metadata: Option<BTreeMap<String, String>>,
}

impl ListEntry {
    pub fn common_prefix(prefix: impl Into<String>) -> Self {
        Self {
            key: prefix.into(),
            kind: EntryKind::CommonPrefix,
            size: 0,
            version_id: None,
            metadata: None,
        }
    }
}

/// One page of listing results
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    pub next_cursor: Option<String>,
    /// The store has no more results for this listing
    pub done: bool,
}

impl ListPage {
    /// Bytes of key names returned by this page
    pub fn key_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.key.len() as u64).sum()
    }
}

#[async_trait]
pub trait ListStore: Send + Sync {
    /// Create `key` with `size` bytes of data, `versions` times
    async fn put(&self, key: &str, size: u64, versions: u32) -> Result<()>;

    /// Fetch one page of a listing
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Create a store for a target URI
pub async fn create_store_for_uri(uri: &str, options: S3StoreOptions) -> Result<Arc<dyn ListStore>> {
    let parsed = Url::parse(uri).with_context(|| format!("Invalid target URI: {}", uri))?;
    match parsed.scheme() {
        "mem" | "memory" => Ok(Arc::new(MemoryStore::new())),
        "s3" => {
            let bucket = parsed
                .host_str()
                .filter(|b| !b.is_empty())
                .with_context(|| format!("Missing bucket in target URI: {}", uri))?;
            let store = S3Store::connect(bucket, options).await?;
            Ok(Arc::new(store))
        }
        scheme => bail!(
            "Unsupported target scheme '{}'. Supported schemes: mem://, s3://",
            scheme
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_store() {
        let store = create_store_for_uri("mem://", S3StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(store.describe(), "mem://");
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let err = create_store_for_uri("ftp://host/", S3StoreOptions::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unsupported target scheme"));
    }

    #[test]
    fn test_key_bytes() {
        let page = ListPage {
            entries: vec![ListEntry::common_prefix("ab/"), ListEntry::common_prefix("cde/")],
            next_cursor: None,
            done: true,
        };
        assert_eq!(page.key_bytes(), 7);
    }
}
