// tests/benchmark_run_tests.rs
//! End-to-end benchmark runs against the in-memory store
//!
//! Covers the run lifecycle: population, listing existing trees, stop
//! conditions (iterations, deadline, cancellation) and escalation of list
//! failures once the run-wide threshold is crossed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use list_bench::config::BenchmarkConfig;
use list_bench::samples::OpKind;
use list_bench::store::memory::MemoryStore;
use list_bench::{BenchError, ListBenchmark, StopReason};
use tokio_util::sync::CancellationToken;

fn base_config() -> BenchmarkConfig {
    BenchmarkConfig {
        nested: true,
        branching_factors: "2/2".parse().unwrap(),
        objects: 4,
        concurrency: 2,
        duration: Duration::from_secs(30),
        iterations: Some(3),
        seed: Some(7),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_populate_then_list_with_iteration_bound() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let bench = ListBenchmark::new(base_config(), store.clone())?;

    let report = bench.run(CancellationToken::new()).await?;
    report.check()?;

    let population = report.population.as_ref().expect("population ran");
    assert_eq!(population.objects, 4);
    assert_eq!(population.samples.len(), 4);
    assert!(population.samples.iter().all(|s| s.op == OpKind::Put && s.is_success()));
    assert_eq!(store.key_count(), 4);

    assert_eq!(report.stop, StopReason::Iterations);
    assert_eq!(report.iterations, 6, "2 workers x 3 iterations");
    assert_eq!(report.seed, 7);

    // depth unset: the delimiter listing at the root sees the two top-level prefixes
    assert_eq!(report.target.prefix, "");
    assert_eq!(report.samples.len(), 6);
    assert!(report.samples.iter().all(|s| s.op == OpKind::List && s.keys == 2));
    Ok(())
}

#[tokio::test]
async fn test_versioned_listing_returns_every_version() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let config = BenchmarkConfig {
        nested: false,
        objects: 4,
        versions: 3,
        concurrency: 1,
        iterations: Some(1),
        ..base_config()
    };
    let report = ListBenchmark::new(config, store.clone())?
        .run(CancellationToken::new())
        .await?;

    assert_eq!(store.version_count("obj_00000000.dat"), 3);
    let keys: u64 = report.samples.iter().map(|s| s.keys).sum();
    assert_eq!(keys, 12);
    Ok(())
}

#[tokio::test]
async fn test_list_existing_with_verification() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    ListBenchmark::new(base_config(), store.clone())?
        .run(CancellationToken::new())
        .await?;
    let puts = store.put_calls();

    let config = BenchmarkConfig {
        list_existing: true,
        verify_existing: true,
        depth_to_list: 1,
        recursive: true,
        ..base_config()
    };
    let report = ListBenchmark::new(config, store.clone())?
        .run(CancellationToken::new())
        .await?;

    assert!(report.population.is_none());
    assert_eq!(store.put_calls(), puts, "listing existing data must not upload");
    assert_eq!(report.target.depth, 1);
    assert!(report.target.prefix.starts_with("d1_w"));
    assert!(report.samples.iter().all(|s| s.keys == 2));
    Ok(())
}

#[tokio::test]
async fn test_verify_existing_detects_missing_tree() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let config = BenchmarkConfig {
        list_existing: true,
        verify_existing: true,
        ..base_config()
    };
    let err = ListBenchmark::new(config, store)?
        .run(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::CapacityMismatch(_)), "got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn test_same_seed_lists_same_prefix() -> Result<()> {
    let config = BenchmarkConfig {
        branching_factors: "4/4/4".parse().unwrap(),
        objects: 64,
        depth_to_list: 2,
        iterations: Some(1),
        seed: Some(1234),
        ..base_config()
    };

    let mut prefixes = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(MemoryStore::new());
        let report = ListBenchmark::new(config.clone(), store)?
            .run(CancellationToken::new())
            .await?;
        prefixes.push(report.target.prefix);
    }
    assert_eq!(prefixes[0], prefixes[1]);
    Ok(())
}

#[tokio::test]
async fn test_deadline_stops_unbounded_listing() -> Result<()> {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(2)));
    let config = BenchmarkConfig {
        duration: Duration::from_millis(300),
        iterations: None,
        ..base_config()
    };
    let report = ListBenchmark::new(config, store)?
        .run(CancellationToken::new())
        .await?;

    assert_eq!(report.stop, StopReason::Deadline);
    assert!(report.iterations > 0);
    assert!(report.wall < Duration::from_secs(10));
    report.check()?;
    Ok(())
}

#[tokio::test]
async fn test_external_cancellation_stops_run() -> Result<()> {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(5)));
    let config = BenchmarkConfig {
        duration: Duration::from_secs(60),
        iterations: None,
        ..base_config()
    };
    let bench = ListBenchmark::new(config, store)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = bench.run(cancel).await?;
    assert_eq!(report.stop, StopReason::Cancelled);
    assert!(report.wall < Duration::from_secs(10));
    report.check()?;
    Ok(())
}

#[tokio::test]
async fn test_list_failures_escalate_after_threshold() -> Result<()> {
    // Population only writes, so every listing page fails
    let store = Arc::new(MemoryStore::new());
    store.fail_next_lists(1_000);
    let config = BenchmarkConfig {
        iterations: None,
        max_consecutive_list_errors: 5,
        max_total_list_errors: 100,
        ..base_config()
    };
    let report = ListBenchmark::new(config, store)?
        .run(CancellationToken::new())
        .await?;

    assert!(matches!(report.stop, StopReason::ListErrors(_)), "stop: {:?}", report.stop);
    assert!(report.samples.failures() >= 5);
    assert!(report.wall < Duration::from_secs(10), "threshold must stop the run early");
    assert!(matches!(report.check(), Err(BenchError::List(_))));

    assert!(!report.list_errors.is_empty());
    assert!(report.list_errors.len() <= 20);
    assert!(report.list_errors[0].contains("injected list failure"), "{:?}", report.list_errors);
    Ok(())
}

#[tokio::test]
async fn test_isolated_failures_do_not_abort() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let config = BenchmarkConfig {
        iterations: Some(10),
        max_consecutive_list_errors: 5,
        ..base_config()
    };
    let bench = ListBenchmark::new(config, store.clone())?;
    store.fail_next_lists(2);

    let report = bench.run(CancellationToken::new()).await?;
    assert_eq!(report.stop, StopReason::Iterations);
    assert_eq!(report.samples.failures(), 2);
    assert_eq!(report.iterations, 20);
    assert_eq!(report.list_errors.len(), 2);
    report.check()?;
    Ok(())
}

#[tokio::test]
async fn test_list_existing_never_benchmarks_an_empty_directory() -> Result<()> {
    // Populated with one worker: indices 0..6 of a 3/4 tree
    let populate = BenchmarkConfig {
        branching_factors: "3/4".parse().unwrap(),
        objects: 6,
        concurrency: 1,
        iterations: Some(1),
        ..base_config()
    };
    let store = Arc::new(MemoryStore::new());
    ListBenchmark::new(populate.clone(), store.clone())?
        .run(CancellationToken::new())
        .await?;
    assert_eq!(store.key_count(), 6);

    // Four listing workers round the expected count up to 8, so the key
    // space believes d1_w1/d2_w2/ and d1_w1/d2_w3/ exist
    let mut rejected = 0;
    for seed in 0..64 {
        let config = BenchmarkConfig {
            list_existing: true,
            concurrency: 4,
            depth_to_list: 2,
            recursive: true,
            seed: Some(seed),
            ..populate.clone()
        };
        match ListBenchmark::new(config, store.clone())?
            .run(CancellationToken::new())
            .await
        {
            Ok(report) => {
                assert!(
                    report.samples.iter().all(|s| s.keys == 1),
                    "seed {} listed an empty target '{}'",
                    seed,
                    report.target.prefix
                );
            }
            Err(BenchError::CapacityMismatch(msg)) => {
                assert!(msg.contains("d1_w1/d2_w"), "seed {}: {}", seed, msg);
                rejected += 1;
            }
            Err(e) => panic!("seed {}: unexpected error {:?}", seed, e),
        }
    }
    assert!(rejected > 0, "some seeds must land on an unpopulated directory");
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected_before_any_request() {
    let store = Arc::new(MemoryStore::new());
    let config = BenchmarkConfig {
        objects: 5,
        concurrency: 1,
        ..base_config()
    };
    let err = ListBenchmark::new(config, store.clone()).err().expect("5 objects do not fit 2/2");
    assert!(matches!(err, BenchError::CapacityMismatch(_)));
    assert_eq!(store.put_calls(), 0);
    assert_eq!(store.list_calls(), 0);
}
