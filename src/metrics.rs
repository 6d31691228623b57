//! Latency summaries of collected samples
//!
//! HDR histograms over successful operations, one summary per operation kind.

use std::time::Duration;

use hdrhistogram::Histogram;

use crate::constants::{HISTOGRAM_MAX_MICROS, HISTOGRAM_SIGFIGS};
use crate::samples::{OpKind, Sample};

/// Aggregate view of one operation kind
#[derive(Debug, Clone, Default)]
pub struct OpSummary {
    pub count: u64,
    pub errors: u64,
    pub keys: u64,
    pub bytes: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
    pub ops_per_sec: f64,
    pub keys_per_sec: f64,
}

impl OpSummary {
    pub fn error_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.errors as f64 / self.count as f64
        }
    }
}

pub fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_MICROS, HISTOGRAM_SIGFIGS)
        .expect("histogram bounds are valid")
}

/// Summarize the samples of one operation kind over `wall` time
pub fn summarize<'a>(
    samples: impl IntoIterator<Item = &'a Sample>,
    op: OpKind,
    wall: Duration,
) -> OpSummary {
    let mut hist = new_histogram();
    let mut summary = OpSummary::default();

    for sample in samples.into_iter().filter(|s| s.op == op) {
        summary.count += 1;
        if !sample.is_success() {
            summary.errors += 1;
            continue;
        }
        summary.keys += sample.keys;
        summary.bytes += sample.bytes;
        let micros = (sample.duration.as_micros() as u64).clamp(1, HISTOGRAM_MAX_MICROS);
        let _ = hist.record(micros);
    }

    if hist.len() > 0 {
        summary.mean_us = hist.mean();
        summary.p50_us = hist.value_at_quantile(0.50);
        summary.p90_us = hist.value_at_quantile(0.90);
        summary.p95_us = hist.value_at_quantile(0.95);
        summary.p99_us = hist.value_at_quantile(0.99);
        summary.max_us = hist.max();
    }
    let secs = wall.as_secs_f64().max(1e-9);
    summary.ops_per_sec = summary.count as f64 / secs;
    summary.keys_per_sec = summary.keys as f64 / secs;
    summary
}

/// Print a one-block summary for an operation
pub fn print_summary(op: OpKind, summary: &OpSummary) {
    if summary.count == 0 {
        return;
    }
    println!(
        "\n{} ops={} errors={} ({:.2}%) keys={} {:.1} ops/s {:.1} keys/s",
        op.as_str(),
        summary.count,
        summary.errors,
        summary.error_rate() * 100.0,
        summary.keys,
        summary.ops_per_sec,
        summary.keys_per_sec
    );
    println!(
        "  latency (µs): mean={:<8.0} p50={:<8} p90={:<8} p95={:<8} p99={:<8} max={:<8}",
        summary.mean_us,
        summary.p50_us,
        summary.p90_us,
        summary.p95_us,
        summary.p99_us,
        summary.max_us
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(op: OpKind, micros: u64, keys: u64, ok: bool) -> Sample {
        Sample {
            op,
            worker: 0,
            iteration: 0,
            started_at: Utc::now(),
            duration: Duration::from_micros(micros),
            keys,
            bytes: keys * 10,
            error: (!ok).then(|| "failed".to_string()),
        }
    }

    #[test]
    fn test_summary_counts_and_percentiles() {
        let samples = vec![
            sample(OpKind::List, 100, 100, true),
            sample(OpKind::List, 200, 100, true),
            sample(OpKind::List, 300, 50, true),
            sample(OpKind::List, 5, 0, false),
            sample(OpKind::Put, 1000, 1, true),
        ];
        let s = summarize(&samples, OpKind::List, Duration::from_secs(2));
        assert_eq!(s.count, 4);
        assert_eq!(s.errors, 1);
        assert_eq!(s.keys, 250);
        assert_eq!(s.bytes, 2500);
        assert!((s.error_rate() - 0.25).abs() < 1e-9);
        assert!((s.keys_per_sec - 125.0).abs() < 1e-9);
        assert!(s.p50_us >= 199 && s.p50_us <= 201, "p50={}", s.p50_us);
        assert!(s.max_us >= 299 && s.max_us <= 301, "max={}", s.max_us);
    }

    #[test]
    fn test_empty_summary() {
        let s = summarize(&Vec::<Sample>::new(), OpKind::List, Duration::from_secs(1));
        assert_eq!(s.count, 0);
        assert_eq!(s.error_rate(), 0.0);
        assert_eq!(s.p99_us, 0);
    }
}
