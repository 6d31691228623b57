//! Population phase: materialize the generated key space in the store
//!
//! The (concurrency-rounded) index range is split into equal, disjoint slices,
//! one per worker. Workers share nothing but an atomic progress counter, the
//! sample collector and an abort token. Any failed upload is fatal: an
//! incomplete tree breaks the index → key mapping that list-existing runs and
//! depth-targeted listing rely on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BenchmarkConfig;
use crate::constants::POPULATE_PROGRESS_INTERVAL;
use crate::error::{BenchError, BenchResult};
use crate::key_space::KeySpace;
use crate::samples::{OpKind, Sample, SampleCollector, SampleSet};
use crate::store::ListStore;

mod verify;

pub use verify::{ensure_target_populated, verify_existing};

#[derive(Debug)]
pub struct PopulationReport {
    pub objects: u64,
    pub versions: u32,
    pub bytes: u64,
    pub elapsed: Duration,
    /// One PUT sample per key (all versions of a key in one sample)
    pub samples: SampleSet,
}

impl PopulationReport {
    pub fn objects_per_sec(&self) -> f64 {
        self.objects as f64 / self.elapsed.as_secs_f64().max(1e-9)
    }
}

/// Upload every key of `key_space` (each with `config.versions` versions).
pub async fn populate(
    store: Arc<dyn ListStore>,
    config: &BenchmarkConfig,
    key_space: &KeySpace,
    cancel: &CancellationToken,
) -> BenchResult<PopulationReport> {
    let start = Instant::now();
    let workers = config.concurrency.max(1) as u64;
    let total = key_space.object_count();
    let per_worker = total / workers;
    if per_worker * workers != total {
        return Err(BenchError::config(format!(
            "object count {} is not a multiple of concurrency {}",
            total, workers
        )));
    }

    info!(
        "Populating {} objects x{} versions ({} bytes each) into {} with {} workers ({} each)",
        total,
        config.versions,
        config.object_size,
        store.describe(),
        workers,
        per_worker
    );

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} objects {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("{} workers", workers));

    let progress = Arc::new(AtomicU64::new(0));
    let collector = SampleCollector::new();
    let abort = cancel.child_token();

    let mut handles = Vec::with_capacity(workers as usize);
    for worker in 0..workers {
        let store = store.clone();
        let key_space = key_space.clone();
        let progress = progress.clone();
        let collector = collector.clone();
        let abort = abort.clone();
        let pb = pb.clone();
        let size = config.object_size;
        let versions = config.versions;
        let range = worker * per_worker..(worker + 1) * per_worker;

        handles.push(tokio::spawn(async move {
            let mut local = Vec::with_capacity(per_worker.min(4096) as usize);
            for key in key_space.keys(range) {
                let started_at = Utc::now();
                let t0 = Instant::now();
                let result = tokio::select! {
                    biased;
                    _ = abort.cancelled() => {
                        collector.extend(local);
                        return Err(BenchError::Cancelled("population"));
                    }
                    r = store.put(&key, size, versions) => r,
                };
                let duration = t0.elapsed();

                if let Err(e) = result {
                    local.push(Sample {
                        op: OpKind::Put,
                        worker: worker as usize,
                        iteration: 0,
                        started_at,
                        duration,
                        keys: 0,
                        bytes: 0,
                        error: Some(format!("{:#}", e)),
                    });
                    collector.extend(local);
                    abort.cancel();
                    return Err(BenchError::Population {
                        created: progress.load(Ordering::Relaxed),
                        expected: 0,
                        message: format!("PUT {}: {:#}", key, e),
                    });
                }

                local.push(Sample {
                    op: OpKind::Put,
                    worker: worker as usize,
                    iteration: 0,
                    started_at,
                    duration,
                    keys: 1,
                    bytes: size * versions as u64,
                    error: None,
                });
                let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                if done % POPULATE_PROGRESS_INTERVAL == 0 {
                    pb.set_position(done);
                }
            }
            collector.extend(local);
            debug!("Population worker {} finished", worker);
            Ok(())
        }));
    }

    let mut first_error: Option<BenchError> = None;
    for handle in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(BenchError::Population {
                created: progress.load(Ordering::Relaxed),
                expected: total,
                message: format!("population worker panicked: {}", join_err),
            }),
        };
        if let Err(e) = outcome {
            // Keep the root cause rather than the cancellations it triggered
            let replace = match (&first_error, &e) {
                (None, _) => true,
                (Some(BenchError::Cancelled(_)), BenchError::Population { .. }) => true,
                _ => false,
            };
            if replace {
                first_error = Some(e);
            }
        }
    }

    let created = progress.load(Ordering::Relaxed);
    pb.set_position(created);

    if let Some(err) = first_error {
        pb.abandon_with_message("aborted");
        let err = match err {
            BenchError::Population { message, .. } => BenchError::Population {
                created,
                expected: total,
                message,
            },
            other => other,
        };
        warn!(
            "Population aborted with {} of {} objects written; the tree is incomplete and must be repopulated",
            created, total
        );
        return Err(err);
    }

    pb.finish_with_message("done");
    let elapsed = start.elapsed();
    let report = PopulationReport {
        objects: created,
        versions: config.versions,
        bytes: created * config.object_size * config.versions as u64,
        elapsed,
        samples: collector.drain(),
    };
    info!(
        "Population complete: {} objects in {:.2}s ({:.0} objects/s)",
        report.objects,
        elapsed.as_secs_f64(),
        report.objects_per_sec()
    );
    Ok(report)
}
