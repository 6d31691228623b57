//! In-process object store
//!
//! Keeps every key (and every version of it) in a sorted map and answers
//! listings with the same prefix, delimiter, page size and continuation
//! semantics as an S3 `ListObjectsV2` / `ListObjectVersions` call. Used for
//! dry runs and by the test suite, which can inject latency and failures.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use super::{EntryKind, ListEntry, ListPage, ListRequest, ListStore};
use crate::constants::LIST_DELIMITER;

/// Separates key and version position inside a versioned cursor
const VERSION_CURSOR_SEP: char = '\u{1f}';

#[derive(Debug, Clone)]
struct StoredVersion {
    version_id: String,
    size: u64,
    modified: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Vec<StoredVersion>>>,
    next_version: AtomicU64,
    put_calls: AtomicU64,
    list_calls: AtomicU64,
    latency: Option<Duration>,
    failing_lists: AtomicU64,
    failing_put_pattern: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` list calls fail
    pub fn fail_next_lists(&self, count: u64) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Make every put of a key containing `pattern` fail
    pub fn fail_puts_matching(&self, pattern: &str) {
        *self.failing_put_pattern.lock() = Some(pattern.to_string());
    }

    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::Relaxed)
    }

    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Number of stored versions of `key` (0 if absent)
    pub fn version_count(&self, key: &str) -> usize {
        self.objects.read().get(key).map_or(0, |v| v.len())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_list_failure(&self) -> bool {
        self.failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn object_entry(key: &str, version: &StoredVersion, request: &ListRequest) -> ListEntry {
        let metadata = request.metadata.then(|| {
            BTreeMap::from([
                ("content-type".to_string(), "application/octet-stream".to_string()),
                ("etag".to_string(), format!("\"{}\"", version.version_id)),
                ("last-modified".to_string(), version.modified.to_rfc3339()),
            ])
        });
        ListEntry {
            key: key.to_string(),
            kind: EntryKind::Object,
            size: version.size,
            version_id: request.versions.then(|| version.version_id.clone()),
            metadata,
        }
    }

    fn list_sorted(&self, request: &ListRequest) -> ListPage {
        let objects = self.objects.read();
        let max_keys = request.max_keys.max(1) as usize;
        let prefix = request.prefix.as_str();

        let (after_key, after_version) = match request.cursor.as_deref() {
            Some(c) if request.versions => match c.split_once(VERSION_CURSOR_SEP) {
                Some((k, v)) => (Some(k.to_string()), v.parse::<usize>().ok()),
                None => (Some(c.to_string()), None),
            },
            Some(c) => (Some(c.to_string()), None),
            None => (None, None),
        };

        // A common-prefix cursor resumes after its whole sub-tree: '0' sorts right after '/'
        let start = match &after_key {
            Some(after) if after.as_str() >= prefix => {
                if request.delimiter && after.ends_with(LIST_DELIMITER) {
                    format!("{}0", &after[..after.len() - 1])
                } else {
                    after.clone()
                }
            }
            _ => prefix.to_string(),
        };

        let mut page = ListPage::default();
        let mut last_cursor: Option<String> = None;
        let mut more = false;

        'keys: for (key, versions) in objects.range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }

            if request.delimiter {
                if let Some(pos) = key[prefix.len()..].find(LIST_DELIMITER) {
                    let common = &key[..prefix.len() + pos + 1];
                    if page.entries.last().is_some_and(|e| e.key == common) {
                        continue;
                    }
                    if page.entries.len() == max_keys {
                        more = true;
                        break;
                    }
                    page.entries.push(ListEntry::common_prefix(common));
                    last_cursor = Some(common.to_string());
                    continue;
                }
            }

            let resuming_this_key = after_key.as_deref() == Some(key.as_str());

            if request.versions {
                // Newest version first, like S3
                for (pos, version) in versions.iter().rev().enumerate() {
                    if resuming_this_key && after_version.is_none_or(|after| pos <= after) {
                        continue;
                    }
                    if page.entries.len() == max_keys {
                        more = true;
                        break 'keys;
                    }
                    page.entries.push(Self::object_entry(key, version, request));
                    last_cursor = Some(format!("{}{}{}", key, VERSION_CURSOR_SEP, pos));
                }
            } else {
                if resuming_this_key {
                    continue;
                }
                let Some(latest) = versions.last() else {
                    continue;
                };
                if page.entries.len() == max_keys {
                    more = true;
                    break;
                }
                page.entries.push(Self::object_entry(key, latest, request));
                last_cursor = Some(key.clone());
            }
        }

        page.done = !more;
        page.next_cursor = if more { last_cursor } else { None };
        page
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    async fn put(&self, key: &str, size: u64, versions: u32) -> Result<()> {
        self.simulate_latency().await;
        self.put_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(pattern) = self.failing_put_pattern.lock().as_deref() {
            if key.contains(pattern) {
                bail!("injected put failure for {}", key);
            }
        }

        let now = Utc::now();
        let mut objects = self.objects.write();
        let stored = objects.entry(key.to_string()).or_default();
        for _ in 0..versions.max(1) {
            let id = self.next_version.fetch_add(1, Ordering::Relaxed);
            stored.push(StoredVersion {
                version_id: format!("v{:016x}", id),
                size,
                modified: now,
            });
        }
        Ok(())
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        self.simulate_latency().await;
        self.list_calls.fetch_add(1, Ordering::Relaxed);

        if self.take_list_failure() {
            bail!("injected list failure for prefix '{}'", request.prefix);
        }
        Ok(self.list_sorted(request))
    }

    fn describe(&self) -> String {
        "mem://".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prefix: &str, delimiter: bool, max_keys: u32) -> ListRequest {
        ListRequest {
            prefix: prefix.to_string(),
            delimiter,
            max_keys,
            cursor: None,
            metadata: false,
            versions: false,
        }
    }

    async fn drain(store: &MemoryStore, mut req: ListRequest) -> (Vec<ListEntry>, usize) {
        let mut all = Vec::new();
        let mut pages = 0;
        loop {
            let page = store.list_page(&req).await.unwrap();
            pages += 1;
            all.extend(page.entries);
            if page.done {
                return (all, pages);
            }
            req.cursor = page.next_cursor;
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for key in ["a/1/x", "a/1/y", "a/2/x", "a/top", "b/1/x", "c"] {
            store.put(key, 10, 1).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_recursive_listing_returns_all_leaves() {
        let store = seeded().await;
        let (entries, pages) = drain(&store, request("a/", false, 2)).await;
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a/1/x", "a/1/y", "a/2/x", "a/top"]);
        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn test_delimiter_collapses_subtrees() {
        let store = seeded().await;
        let (entries, _) = drain(&store, request("", true, 1)).await;
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a/", "b/", "c"]);
        assert_eq!(entries[0].kind, EntryKind::CommonPrefix);
        assert_eq!(entries[2].kind, EntryKind::Object);

        let (entries, _) = drain(&store, request("a/", true, 100)).await;
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a/1/", "a/2/", "a/top"]);
    }

    #[tokio::test]
    async fn test_page_done_flag() {
        let store = seeded().await;
        let page = store.list_page(&request("a/", false, 4)).await.unwrap();
        assert!(page.done);
        assert!(page.next_cursor.is_none());

        let page = store.list_page(&request("a/", false, 3)).await.unwrap();
        assert!(!page.done);
        assert_eq!(page.next_cursor.as_deref(), Some("a/2/x"));
    }

    #[tokio::test]
    async fn test_versioned_listing_pages_through_versions() {
        let store = MemoryStore::new();
        store.put("k/1", 1, 3).await.unwrap();
        store.put("k/2", 1, 2).await.unwrap();
        assert_eq!(store.version_count("k/1"), 3);

        let mut req = request("k/", false, 2);
        req.versions = true;
        let (entries, pages) = drain(&store, req).await;
        assert_eq!(entries.len(), 5);
        assert_eq!(pages, 3);
        assert!(entries.iter().all(|e| e.version_id.is_some()));

        // Without versions only the latest is listed
        let (entries, _) = drain(&store, request("k/", false, 10)).await;
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_listing() {
        let store = seeded().await;
        let mut req = request("a/", false, 10);
        req.metadata = true;
        let page = store.list_page(&req).await.unwrap();
        assert!(page.entries.iter().all(|e| e.metadata.is_some()));

        let page = store.list_page(&request("a/", false, 10)).await.unwrap();
        assert!(page.entries.iter().all(|e| e.metadata.is_none()));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = seeded().await;
        store.fail_next_lists(1);
        assert!(store.list_page(&request("", false, 10)).await.is_err());
        assert!(store.list_page(&request("", false, 10)).await.is_ok());

        store.fail_puts_matching("bad");
        assert!(store.put("x/bad/1", 1, 1).await.is_err());
        assert!(store.put("x/good/1", 1, 1).await.is_ok());
    }
}
