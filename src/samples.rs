//! Per-operation samples and their concurrent collector
//!
//! Workers build a [`Sample`] per page fetch (or per upload during
//! population) and hand it to the shared [`SampleCollector`]. The collector
//! only accumulates; aggregation lives in `metrics` and in external tools.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Put,
    List,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Put => "PUT",
            OpKind::List => "LIST",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub op: OpKind,
    pub worker: usize,
    /// Listing iteration of the worker (0 for uploads)
    pub iteration: u64,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Entries returned (LIST) or objects written (PUT)
    pub keys: u64,
    /// Key-name bytes returned (LIST) or payload bytes written (PUT)
    pub bytes: u64,
    /// Failure message; `None` for a successful operation
    pub error: Option<String>,
}

impl Sample {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Append-only, lock-protected sample buffer shared by all workers
#[derive(Debug, Clone, Default)]
pub struct SampleCollector {
    inner: Arc<Mutex<Vec<Sample>>>,
}

impl SampleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, sample: Sample) {
        self.inner.lock().push(sample);
    }

    /// Append a worker's local batch in one lock acquisition
    pub fn extend(&self, samples: Vec<Sample>) {
        if samples.is_empty() {
            return;
        }
        self.inner.lock().extend(samples);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<Sample> {
        self.inner.lock().clone()
    }

    /// Take ownership of all samples, leaving the collector empty
    pub fn drain(&self) -> SampleSet {
        SampleSet {
            samples: std::mem::take(&mut *self.inner.lock()),
        }
    }
}

/// Read-only result of a run, in recording order (not chronological)
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.samples.iter().filter(|s| !s.is_success()).count()
    }
}

impl IntoIterator for SampleSet {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
