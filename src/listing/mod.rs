//! List executor: paginated LIST workload against one target prefix
//!
//! One iteration walks the target prefix page by page:
//!
//! ```text
//! Idle -> Issuing -> AwaitingPage -> MorePages -> Issuing -> ...
//!                                 \-> Done | Failed
//! ```
//!
//! Every page fetch is recorded as one [`Sample`]. An iteration ends when the
//! store reports completion, when the cumulative key count reaches the total
//! cap, or on the first failed page. Non-recursive iterations use delimiter
//! listing so sub-trees come back as single common-prefix entries.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::BenchmarkConfig;
use crate::constants::MAX_TOTAL_KEYS_UNBOUNDED;
use crate::depth::ListTarget;
use crate::samples::{OpKind, Sample, SampleCollector};
use crate::store::{ListRequest, ListStore};

mod error_tracking;

pub use error_tracking::ListingErrorTracker;

/// What every iteration lists, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPlan {
    pub prefix: String,
    pub recursive: bool,
    pub max_keys: u32,
    /// Cap on keys per iteration; negative means unbounded
    pub max_total_keys: i64,
    pub metadata: bool,
    pub versions: bool,
}

impl ListPlan {
    pub fn new(config: &BenchmarkConfig, target: &ListTarget) -> Self {
        Self {
            prefix: target.prefix.clone(),
            recursive: config.recursive,
            max_keys: config.max_keys,
            max_total_keys: config.max_total_keys,
            metadata: config.metadata,
            versions: config.versions > 1,
        }
    }

    fn key_cap(&self) -> Option<u64> {
        (self.max_total_keys != MAX_TOTAL_KEYS_UNBOUNDED && self.max_total_keys >= 0)
            .then_some(self.max_total_keys as u64)
    }

    /// Request for the next page; the last page shrinks to stay within the cap
    fn request(&self, cursor: Option<String>, keys_so_far: u64) -> ListRequest {
        let page_size = match self.key_cap() {
            Some(cap) => (self.max_keys as u64).min(cap.saturating_sub(keys_so_far)).max(1) as u32,
            None => self.max_keys,
        };
        ListRequest {
            prefix: self.prefix.clone(),
            delimiter: !self.recursive,
            max_keys: page_size,
            cursor,
            metadata: self.metadata,
            versions: self.versions,
        }
    }
}

#[derive(Debug)]
enum ListState {
    Idle,
    Issuing { cursor: Option<String> },
    AwaitingPage(ListRequest),
    MorePages { cursor: String },
    Done,
    Failed(String),
}

/// How an iteration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationEnd {
    /// The store reported no further results
    Completed,
    /// The total-key cap was reached
    Capped,
    Failed(String),
    /// Cancelled while a page was in flight; that page was not recorded
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub pages: u64,
    pub keys: u64,
    pub end: IterationEnd,
}

pub struct ListExecutor {
    store: Arc<dyn ListStore>,
    plan: ListPlan,
}

impl ListExecutor {
    pub fn new(store: Arc<dyn ListStore>, plan: ListPlan) -> Self {
        Self { store, plan }
    }

    /// Run one full paginated listing of the target prefix
    pub async fn list_once(
        &self,
        worker: usize,
        iteration: u64,
        cancel: &CancellationToken,
        samples: &SampleCollector,
    ) -> IterationOutcome {
        let cap = self.plan.key_cap();
        let mut pages = 0u64;
        let mut keys = 0u64;
        let mut capped = false;
        let mut state = ListState::Idle;

        loop {
            trace!(worker, iteration, ?state, "list state");
            state = match state {
                ListState::Idle => ListState::Issuing { cursor: None },
                ListState::Issuing { cursor } => ListState::AwaitingPage(self.plan.request(cursor, keys)),
                ListState::AwaitingPage(request) => {
                    let started_at = Utc::now();
                    let t0 = Instant::now();
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return IterationOutcome { pages, keys, end: IterationEnd::Cancelled };
                        }
                        r = self.store.list_page(&request) => r,
                    };
                    let duration = t0.elapsed();
                    pages += 1;

                    match result {
                        Ok(page) => {
                            let returned = page.entries.len() as u64;
                            keys += returned;
                            samples.record(Sample {
                                op: OpKind::List,
                                worker,
                                iteration,
                                started_at,
                                duration,
                                keys: returned,
                                bytes: page.key_bytes(),
                                error: None,
                            });

                            if cap.is_some_and(|cap| keys >= cap) {
                                capped = true;
                                ListState::Done
                            } else if page.done {
                                ListState::Done
                            } else if let Some(cursor) = page.next_cursor {
                                ListState::MorePages { cursor }
                            } else {
                                warn!(
                                    "Store reported more results for '{}' without a cursor; ending iteration",
                                    request.prefix
                                );
                                ListState::Done
                            }
                        }
                        Err(e) => {
                            let message = format!("{:#}", e);
                            samples.record(Sample {
                                op: OpKind::List,
                                worker,
                                iteration,
                                started_at,
                                duration,
                                keys: 0,
                                bytes: 0,
                                error: Some(message.clone()),
                            });
                            ListState::Failed(message)
                        }
                    }
                }
                ListState::MorePages { cursor } => ListState::Issuing { cursor: Some(cursor) },
                ListState::Done => {
                    debug!(worker, iteration, pages, keys, capped, "listing iteration complete");
                    let end = if capped { IterationEnd::Capped } else { IterationEnd::Completed };
                    return IterationOutcome { pages, keys, end };
                }
                ListState::Failed(message) => {
                    debug!(worker, iteration, pages, "listing iteration failed: {}", message);
                    return IterationOutcome { pages, keys, end: IterationEnd::Failed(message) };
                }
            };
        }
    }
}
