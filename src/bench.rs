//! Benchmark entry points: `validate` and `ListBenchmark::run`
//!
//! A run validates the configuration, populates the store (unless listing an
//! existing tree), picks the target prefix and then drives `concurrency`
//! listing workers until the deadline, the iteration bound, an external
//! cancellation or the list-failure threshold stops them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{validate, BenchmarkConfig};
use crate::depth::{DepthSelector, ListTarget};
use crate::error::{BenchError, BenchResult};
use crate::listing::{IterationEnd, ListExecutor, ListPlan, ListingErrorTracker};
use crate::prepare::{ensure_target_populated, populate, verify_existing, PopulationReport};
use crate::samples::{SampleCollector, SampleSet};
use crate::store::ListStore;

/// Why the listing phase ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Deadline,
    /// Every worker finished its iteration bound
    Iterations,
    /// Cancelled from outside (Ctrl-C, harness shutdown)
    Cancelled,
    /// The run-wide list failure threshold was crossed
    ListErrors(String),
}

#[derive(Debug)]
pub struct RunReport {
    /// Seed used for depth selection (log it to repeat the run)
    pub seed: u64,
    pub target: ListTarget,
    pub population: Option<PopulationReport>,
    /// Every LIST page sample, in recording order
    pub samples: SampleSet,
    /// First failed-page messages of the run (bounded)
    pub list_errors: Vec<String>,
    pub iterations: u64,
    pub wall: Duration,
    pub stop: StopReason,
}

impl RunReport {
    /// Escalate a threshold stop into an error, after the report was consumed
    pub fn check(&self) -> BenchResult<()> {
        match &self.stop {
            StopReason::ListErrors(msg) => Err(BenchError::List(msg.clone())),
            _ => Ok(()),
        }
    }
}

pub struct ListBenchmark {
    config: BenchmarkConfig,
    store: Arc<dyn ListStore>,
}

impl ListBenchmark {
    /// Validate `config` and bind it to a store
    pub fn new(config: BenchmarkConfig, store: Arc<dyn ListStore>) -> BenchResult<Self> {
        validate(&config)?;
        Ok(Self { config, store })
    }

    pub async fn run(&self, cancel: CancellationToken) -> BenchResult<RunReport> {
        let config = &self.config;
        let key_space = config.key_space()?;

        let population = if config.list_existing {
            info!("Listing existing data under '{}' (population skipped)", key_space.root_prefix());
            if config.verify_existing {
                verify_existing(self.store.as_ref(), &key_space).await?;
            }
            None
        } else {
            Some(populate(self.store.clone(), config, &key_space, &cancel).await?)
        };

        let selector = DepthSelector::from_optional_seed(config.seed);
        let target = selector.resolve(&key_space, config.depth_to_list)?;
        if config.list_existing {
            ensure_target_populated(self.store.as_ref(), &target.prefix).await?;
        }
        info!(
            "Listing target '{}' (depth {}, seed {}, {}, max_keys={}, max_total_keys={})",
            target.prefix,
            target.depth,
            selector.seed(),
            if config.recursive { "recursive" } else { "delimited" },
            config.max_keys,
            config.max_total_keys
        );

        let executor = Arc::new(ListExecutor::new(
            self.store.clone(),
            ListPlan::new(config, &target),
        ));
        let run_token = cancel.child_token();
        let tracker = ListingErrorTracker::with_thresholds(
            config.max_total_list_errors,
            config.max_consecutive_list_errors,
        );
        let fatal: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let collector = SampleCollector::new();

        let start = Instant::now();
        let timer = {
            let token = run_token.clone();
            let duration = config.duration;
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        debug!("Run duration elapsed");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        };

        let mut workers = FuturesUnordered::new();
        for worker in 0..config.concurrency {
            let executor = executor.clone();
            let token = run_token.clone();
            let tracker = tracker.clone();
            let fatal = fatal.clone();
            let collector = collector.clone();
            let max_iterations = config.iterations;

            workers.push(tokio::spawn(async move {
                let mut iteration = 0u64;
                while !token.is_cancelled() && max_iterations.is_none_or(|max| iteration < max) {
                    let outcome = executor.list_once(worker, iteration, &token, &collector).await;
                    match outcome.end {
                        IterationEnd::Completed | IterationEnd::Capped => tracker.record_success(),
                        IterationEnd::Failed(msg) => {
                            let (abort, total, consecutive) = tracker.record_error(&msg);
                            debug!("LIST error (worker {}, {} total, {} consecutive): {}", worker, total, consecutive, msg);
                            if abort {
                                let mut fatal = fatal.lock();
                                if fatal.is_none() {
                                    *fatal = Some(format!(
                                        "{} failed pages ({} consecutive); last error: {}",
                                        total, consecutive, msg
                                    ));
                                }
                                token.cancel();
                            }
                        }
                        IterationEnd::Cancelled => break,
                    }
                    iteration += 1;
                }
                iteration
            }));
        }

        let mut iterations = 0u64;
        while let Some(joined) = workers.next().await {
            match joined {
                Ok(n) => iterations += n,
                Err(e) => warn!("Listing worker panicked: {}", e),
            }
        }
        let wall = start.elapsed();
        run_token.cancel();
        let _ = timer.await;

        let stop = if let Some(msg) = fatal.lock().take() {
            warn!("Listing stopped by failure threshold: {}", msg);
            StopReason::ListErrors(msg)
        } else if cancel.is_cancelled() {
            StopReason::Cancelled
        } else if config.iterations.is_some() && wall < config.duration {
            StopReason::Iterations
        } else {
            StopReason::Deadline
        };

        let samples = collector.drain();
        info!(
            "Listing finished ({:?}): {} iterations, {} pages, {} failed, {:.2}s",
            stop,
            iterations,
            samples.len(),
            tracker.total_errors(),
            wall.as_secs_f64()
        );

        Ok(RunReport {
            seed: selector.seed(),
            target,
            population,
            samples,
            list_errors: tracker.error_messages(),
            iterations,
            wall,
            stop,
        })
    }
}
