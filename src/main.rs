// -----------------------------------------------------------------------------
// list-bench - LIST benchmark over reproducible nested namespaces
// -----------------------------------------------------------------------------

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::runtime::Builder as RtBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use list_bench::config::{validate, BenchmarkConfig};
use list_bench::metrics::{print_summary, summarize};
use list_bench::samples::OpKind;
use list_bench::size_parser::{format_size, parse_size};
use list_bench::store::create_store_for_uri;
use list_bench::tsv_export::TsvExporter;
use list_bench::{BranchingFactors, ListBenchmark};

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(name = "list-bench", version, about = "Benchmark list objects over nested key hierarchies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate (unless --list-existing) and run the listing benchmark
    ///
    /// Examples:
    ///   list-bench run --target mem:// --nested --branching-factors 10/10/10 --objects 1000
    ///   list-bench run --config list.yaml --depth-to-list 2 --seed 42
    ///   list-bench run --target s3://bucket --list-existing --recursive --max-total-keys 5000
    Run {
        #[command(flatten)]
        bench: BenchArgs,

        /// Export every raw sample to <PATH>-samples.tsv
        #[arg(long, value_name = "PATH")]
        results_tsv: Option<PathBuf>,
    },
    /// Validate a configuration and show the generated key space (no network activity)
    Validate {
        #[command(flatten)]
        bench: BenchArgs,

        /// Number of generated keys to print
        #[arg(long, default_value_t = 5)]
        show_keys: u64,
    },
}

/// Benchmark settings; flags override the YAML config file
#[derive(Args, Debug, Default)]
struct BenchArgs {
    /// YAML config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Target store URI (mem://, s3://bucket)
    #[arg(long)]
    target: Option<String>,

    /// Number of objects to upload. Rounded up to have equal concurrent objects.
    #[arg(long)]
    objects: Option<u64>,

    /// Number of versions to upload. If more than 1, versioned listing is benchmarked.
    #[arg(long)]
    versions: Option<u32>,

    /// Size of each generated object (number or 10KB/MB/GB, base 2)
    #[arg(long = "obj-size")]
    obj_size: Option<String>,

    /// Extended listing with per-object metadata
    #[arg(long)]
    metadata: bool,

    /// Nested key hierarchy instead of a flat namespace
    #[arg(long)]
    nested: bool,

    /// Branching factor per level separated by '/', e.g. /12/30/1000 (with --nested)
    #[arg(long)]
    branching_factors: Option<String>,

    /// Fixed prefix for all keys
    #[arg(long)]
    prefix: Option<String>,

    /// Level to list: 0 = root, 1 = top-level directory, ...; a random directory is chosen
    #[arg(long, allow_hyphen_values = true)]
    depth_to_list: Option<i64>,

    /// List existing, previously populated data instead of uploading
    #[arg(long)]
    list_existing: bool,

    /// Count the existing tree before listing (with --list-existing)
    #[arg(long)]
    verify_existing: bool,

    /// Max keys per page of a list request
    #[arg(long)]
    max_keys: Option<u32>,

    /// Max keys across all pages of one listing (-1 = unbounded)
    #[arg(long, allow_hyphen_values = true)]
    max_total_keys: Option<i64>,

    /// List recursively instead of immediate children only
    #[arg(long)]
    recursive: bool,

    /// Concurrent workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Listing phase duration (e.g. 30s, 5m)
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Listing iterations per worker
    #[arg(long)]
    iterations: Option<u64>,

    /// Seed for depth selection (random per run when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Custom S3 endpoint (MinIO etc.)
    #[arg(long)]
    s3_endpoint: Option<String>,
}

impl BenchArgs {
    /// Load the config file (if any) and apply flag overrides
    fn into_config(self) -> Result<BenchmarkConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("read {}", path.display()))?;
                BenchmarkConfig::from_yaml(&text).with_context(|| format!("parse {}", path.display()))?
            }
            None => BenchmarkConfig::default(),
        };

        if let Some(v) = self.target {
            cfg.target = v;
        }
        if let Some(v) = self.objects {
            cfg.objects = v;
        }
        if let Some(v) = self.versions {
            cfg.versions = v;
        }
        if let Some(v) = self.obj_size {
            cfg.object_size = parse_size(&v).with_context(|| format!("invalid --obj-size '{}'", v))?;
        }
        if let Some(v) = self.branching_factors {
            cfg.branching_factors = v.parse::<BranchingFactors>()?;
        }
        if let Some(v) = self.prefix {
            cfg.prefix = v;
        }
        if let Some(v) = self.depth_to_list {
            cfg.depth_to_list = v;
        }
        if let Some(v) = self.max_keys {
            cfg.max_keys = v;
        }
        if let Some(v) = self.max_total_keys {
            cfg.max_total_keys = v;
        }
        if let Some(v) = self.concurrency {
            cfg.concurrency = v;
        }
        if let Some(v) = self.duration {
            cfg.duration = v;
        }
        if self.iterations.is_some() {
            cfg.iterations = self.iterations;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.s3_endpoint.is_some() {
            cfg.s3_endpoint = self.s3_endpoint;
        }
        cfg.metadata |= self.metadata;
        cfg.nested |= self.nested;
        cfg.list_existing |= self.list_existing;
        cfg.verify_existing |= self.verify_existing;
        cfg.recursive |= self.recursive;

        Ok(cfg)
    }
}

// -----------------------------------------------------------------------------
// main
// -----------------------------------------------------------------------------
fn main() -> Result<()> {
    // AWS_REGION, AWS_ENDPOINT_URL, credentials, ...
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("list_bench={},aws_config=warn,aws_sdk_s3=warn", level)));
    fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { bench, results_tsv } => run_cmd(bench.into_config()?, results_tsv),
        Commands::Validate { bench, show_keys } => validate_cmd(bench.into_config()?, show_keys),
    }
}

// -----------------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------------
fn validate_cmd(cfg: BenchmarkConfig, show_keys: u64) -> Result<()> {
    validate(&cfg)?;
    let ks = cfg.key_space()?;

    println!("Configuration OK");
    println!(
        "  objects: {} (requested {}, {} per worker x {} workers)",
        ks.object_count(),
        cfg.objects,
        cfg.objects_per_worker(),
        cfg.concurrency
    );
    println!("  versions: {}  object size: {}", cfg.versions, format_size(cfg.object_size));
    if ks.is_nested() {
        let capacity = cfg
            .branching_factors
            .capacity()
            .map_or_else(|| "overflow".to_string(), |c| c.to_string());
        println!(
            "  nested: {} levels, branching {} (capacity {})",
            ks.levels(),
            cfg.branching_factors,
            capacity
        );
    } else {
        println!("  flat namespace");
    }
    println!("  root prefix: '{}'", ks.root_prefix());
    for key in ks.keys(0..show_keys) {
        println!("    {}", key);
    }
    Ok(())
}

fn run_cmd(cfg: BenchmarkConfig, results_tsv: Option<PathBuf>) -> Result<()> {
    validate(&cfg)?;

    let rt = RtBuilder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        let store = create_store_for_uri(&cfg.target, cfg.s3_options())
            .await
            .with_context(|| format!("Failed to create store for {}", cfg.target))?;
        let bench = ListBenchmark::new(cfg, store)?;

        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping workers");
                    cancel.cancel();
                }
            });
        }

        let report = bench.run(cancel).await?;

        if let Some(pop) = &report.population {
            let put = summarize(&pop.samples, OpKind::Put, pop.elapsed);
            println!(
                "Populated {} objects ({} versions each) in {:.2}s ({:.0} objects/s)",
                pop.objects,
                pop.versions,
                pop.elapsed.as_secs_f64(),
                pop.objects_per_sec()
            );
            print_summary(OpKind::Put, &put);
        }

        println!(
            "\nListed '{}' (depth {}, seed {}) for {:.2}s: {} iterations, stop: {:?}",
            report.target.prefix,
            report.target.depth,
            report.seed,
            report.wall.as_secs_f64(),
            report.iterations,
            report.stop
        );
        let list = summarize(&report.samples, OpKind::List, report.wall);
        print_summary(OpKind::List, &list);
        if !report.list_errors.is_empty() {
            println!("\nFirst LIST errors ({}):", report.list_errors.len());
            for msg in &report.list_errors {
                println!("  {}", msg);
            }
        }

        if let Some(base) = results_tsv {
            let path = TsvExporter::new(base).export_samples(&report.samples)?;
            info!("Samples exported to {}", path.display());
            println!("\nSamples exported to: {}", path.display());
        }

        report.check()?;
        Ok::<(), anyhow::Error>(())
    })
}
