//! S3-compatible store built on the AWS SDK
//!
//! - put: `PutObject`, repeated once per version (bucket versioning must be
//!   enabled for versions to accumulate)
//! - list: `ListObjectsV2`; metadata mode sets `fetch-owner`
//! - versioned list: `ListObjectVersions`, cursor carries key + version markers

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, info};

use super::{EntryKind, ListEntry, ListPage, ListRequest, ListStore};
use crate::constants::LIST_DELIMITER;

/// Page size parameter; the SDK takes an i32
fn page_size(max_keys: u32) -> i32 {
    i32::try_from(max_keys).unwrap_or(i32::MAX)
}

/// Separates key marker and version-id marker inside a versioned cursor
const VERSION_CURSOR_SEP: char = '\n';

/// Connection overrides for S3-compatible services
#[derive(Debug, Clone, Default)]
pub struct S3StoreOptions {
    /// Custom endpoint (e.g. http://localhost:9000); enables path-style addressing
    pub endpoint: Option<String>,
    pub region: Option<String>,
}

pub struct S3Store {
    client: s3::Client,
    bucket: String,
}

impl S3Store {
    pub async fn connect(bucket: &str, options: S3StoreOptions) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(
            options
                .region
                .clone()
                .or_else(|| std::env::var("AWS_REGION").ok())
                .map(Region::new),
        )
        .or_default_provider()
        .or_else(Region::new("us-east-1"));

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = s3::config::Builder::from(&sdk_config);
        let endpoint = options
            .endpoint
            .clone()
            .or_else(|| std::env::var("AWS_ENDPOINT_URL").ok());
        if let Some(endpoint) = endpoint {
            info!("Using custom S3 endpoint {} (path-style)", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: s3::Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        })
    }

    async fn list_current(&self, request: &ListRequest) -> Result<ListPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&request.prefix)
            .max_keys(page_size(request.max_keys))
            .fetch_owner(request.metadata)
            .set_delimiter(request.delimiter.then(|| LIST_DELIMITER.to_string()))
            .set_continuation_token(request.cursor.clone())
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .with_context(|| format!("ListObjectsV2 s3://{}/{}", self.bucket, request.prefix))?;

        let mut entries = Vec::with_capacity(resp.key_count().unwrap_or_default().max(0) as usize);
        for obj in resp.contents() {
            let metadata = request.metadata.then(|| {
                let mut m = BTreeMap::new();
                if let Some(etag) = obj.e_tag() {
                    m.insert("etag".to_string(), etag.to_string());
                }
                if let Some(modified) = obj.last_modified() {
                    m.insert("last-modified".to_string(), modified.to_string());
                }
                if let Some(class) = obj.storage_class() {
                    m.insert("storage-class".to_string(), class.as_str().to_string());
                }
                if let Some(owner) = obj.owner().and_then(|o| o.id()) {
                    m.insert("owner".to_string(), owner.to_string());
                }
                m
            });
            entries.push(ListEntry {
                key: obj.key().unwrap_or_default().to_string(),
                kind: EntryKind::Object,
                size: obj.size().unwrap_or_default().max(0) as u64,
                version_id: None,
                metadata,
            });
        }
        for cp in resp.common_prefixes() {
            if let Some(p) = cp.prefix() {
                entries.push(ListEntry::common_prefix(p));
            }
        }

        let next_cursor = resp
            .next_continuation_token()
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let done = !resp.is_truncated().unwrap_or(false) || next_cursor.is_none();
        Ok(ListPage { entries, next_cursor, done })
    }

    async fn list_versions(&self, request: &ListRequest) -> Result<ListPage> {
        let (key_marker, version_marker) = match request.cursor.as_deref() {
            Some(c) => match c.split_once(VERSION_CURSOR_SEP) {
                Some((k, v)) => (Some(k.to_string()), Some(v.to_string()).filter(|v| !v.is_empty())),
                None => (Some(c.to_string()), None),
            },
            None => (None, None),
        };

        let resp = self
            .client
            .list_object_versions()
            .bucket(&self.bucket)
            .prefix(&request.prefix)
            .max_keys(page_size(request.max_keys))
            .set_delimiter(request.delimiter.then(|| LIST_DELIMITER.to_string()))
            .set_key_marker(key_marker)
            .set_version_id_marker(version_marker)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .with_context(|| format!("ListObjectVersions s3://{}/{}", self.bucket, request.prefix))?;

        let mut entries = Vec::new();
        for v in resp.versions() {
            let metadata = request.metadata.then(|| {
                let mut m = BTreeMap::new();
                if let Some(etag) = v.e_tag() {
                    m.insert("etag".to_string(), etag.to_string());
                }
                if let Some(modified) = v.last_modified() {
                    m.insert("last-modified".to_string(), modified.to_string());
                }
                m.insert("is-latest".to_string(), v.is_latest().unwrap_or(false).to_string());
                m
            });
            entries.push(ListEntry {
                key: v.key().unwrap_or_default().to_string(),
                kind: EntryKind::Object,
                size: v.size().unwrap_or_default().max(0) as u64,
                version_id: v.version_id().map(str::to_string),
                metadata,
            });
        }
        for marker in resp.delete_markers() {
            entries.push(ListEntry {
                key: marker.key().unwrap_or_default().to_string(),
                kind: EntryKind::DeleteMarker,
                size: 0,
                version_id: marker.version_id().map(str::to_string),
                metadata: None,
            });
        }
        for cp in resp.common_prefixes() {
            if let Some(p) = cp.prefix() {
                entries.push(ListEntry::common_prefix(p));
            }
        }

        let truncated = resp.is_truncated().unwrap_or(false);
        let next_cursor = match (truncated, resp.next_key_marker()) {
            (true, Some(key)) => Some(format!(
                "{}{}{}",
                key,
                VERSION_CURSOR_SEP,
                resp.next_version_id_marker().unwrap_or_default()
            )),
            _ => None,
        };
        Ok(ListPage {
            entries,
            done: next_cursor.is_none(),
            next_cursor,
        })
    }
}

#[async_trait]
impl ListStore for S3Store {
    async fn put(&self, key: &str, size: u64, versions: u32) -> Result<()> {
        let body = Bytes::from(vec![0u8; size as usize]);
        for version in 0..versions.max(1) {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(body.clone()))
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
                .with_context(|| format!("PutObject s3://{}/{} (version {})", self.bucket, key, version + 1))?;
        }
        debug!("PUT s3://{}/{} x{}", self.bucket, key, versions);
        Ok(())
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        if request.versions {
            self.list_versions(request).await
        } else {
            self.list_current(request).await
        }
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
