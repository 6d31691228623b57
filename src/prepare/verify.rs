//! Count an existing tree before a list-existing run

use std::time::Instant;

use tracing::info;

use crate::error::{BenchError, BenchResult};
use crate::key_space::KeySpace;
use crate::store::{EntryKind, ListRequest, ListStore};

const VERIFY_PAGE_SIZE: u32 = 1000;

/// Recursively count the keys under the namespace root and compare with the
/// key space. Returns the counted keys; a difference is a `CapacityMismatch`.
pub async fn verify_existing(store: &dyn ListStore, key_space: &KeySpace) -> BenchResult<u64> {
    let start = Instant::now();
    let mut request = ListRequest {
        prefix: key_space.root_prefix(),
        delimiter: false,
        max_keys: VERIFY_PAGE_SIZE,
        cursor: None,
        metadata: false,
        versions: false,
    };

    let mut found = 0u64;
    loop {
        let page = store.list_page(&request).await?;
        found += page
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::Object)
            .count() as u64;
        match page.next_cursor {
            Some(cursor) if !page.done => request.cursor = Some(cursor),
            _ => break,
        }
    }

    info!(
        "Existing tree under '{}': {} keys ({:.1}s)",
        request.prefix,
        found,
        start.elapsed().as_secs_f64()
    );

    let expected = key_space.object_count();
    if found != expected {
        return Err(BenchError::CapacityMismatch(format!(
            "existing tree under '{}' has {} keys, configuration expects {}",
            request.prefix, found, expected
        )));
    }
    Ok(found)
}

/// Fail unless at least one key exists below `prefix`.
///
/// An existing tree may have been populated with a different object count
/// or concurrency than the listing run assumes, so a selected directory can
/// be empty even though the key space says otherwise.
pub async fn ensure_target_populated(store: &dyn ListStore, prefix: &str) -> BenchResult<()> {
    let page = store
        .list_page(&ListRequest {
            prefix: prefix.to_string(),
            delimiter: false,
            max_keys: 1,
            cursor: None,
            metadata: false,
            versions: false,
        })
        .await?;
    if page.entries.is_empty() {
        return Err(BenchError::CapacityMismatch(format!(
            "listing target '{}' holds no keys; the existing tree does not match the configured namespace",
            prefix
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_matching_and_mismatching_trees() {
        let factors = "3/3".parse().unwrap();
        let ks = KeySpace::nested("v", &factors, 9).unwrap();
        let store = MemoryStore::new();
        for key in ks.keys(0..8) {
            store.put(&key, 1, 1).await.unwrap();
        }
        let err = verify_existing(&store, &ks).await.unwrap_err();
        assert!(matches!(err, BenchError::CapacityMismatch(_)));

        store.put(&ks.key(8), 1, 1).await.unwrap();
        assert_eq!(verify_existing(&store, &ks).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_empty_target_is_reported() {
        let store = MemoryStore::new();
        store.put("t/d1_w0/obj_00000000.dat", 1, 1).await.unwrap();

        assert!(ensure_target_populated(&store, "t/d1_w0/").await.is_ok());
        assert!(ensure_target_populated(&store, "t/").await.is_ok());
        let err = ensure_target_populated(&store, "t/d1_w1/").await.unwrap_err();
        assert!(matches!(err, BenchError::CapacityMismatch(_)));
        assert!(err.to_string().contains("t/d1_w1/"));
    }
}
