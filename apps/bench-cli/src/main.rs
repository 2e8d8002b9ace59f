//! Benchmark harness CLI
//!
//! Samples HTTP targets into raw artifacts and runs the quality checks used
//! by CI:
//!
//! - `measure`: sample one target and write its raw artifact
//! - `batch`: run one request batch (timed externally by hyperfine)
//! - `raw-check` / `stats-check`: validate raw artifacts
//! - `summary-check`: validate `summary.json`
//! - `variance-check` / `benchstat-check` / `ci-check`: quality gates
//! - `report`: write `summary.json` and `report.md`
//!
//! Any policy violation or malformed input exits non-zero with the
//! violating message on stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use bench_harness::checks::{self, ResultsLayout, DEFAULT_RESULTS_ROOT};
use bench_harness::config::{Engine, Policy};
use bench_harness::regression::{Benchstat, RegressionComparator};
use bench_harness::reporter::{self, OutputFormat, Reporter};
use bench_harness::sampler::{run_batch, HttpProbe, ReqwestProbe, Sampler, Target};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for the benchmark harness
#[derive(Parser, Debug)]
#[command(name = "bench")]
#[command(about = "HTTP framework benchmark sampling and quality gates")]
struct Args {
    /// Policy file (TOML or JSON); defaults apply if it does not exist
    #[arg(long, global = true, default_value = "stats-policy.json")]
    policy: PathBuf,

    /// Results root; every written summary must stay under it
    #[arg(long, global = true, default_value = DEFAULT_RESULTS_ROOT)]
    results_root: PathBuf,

    /// Raw artifact directory (default: <results-root>/raw)
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample one target and write its raw artifact
    Measure {
        #[arg(long)]
        framework: String,
        /// Base URL of the target, e.g. http://localhost:3001
        #[arg(long)]
        target: String,
        #[arg(long, default_value = "/health")]
        endpoint: String,
        /// Parity verdict recorded in the artifact
        #[arg(long = "parity-result", default_value = "unknown")]
        parity: String,
        #[arg(long)]
        warmup_requests: Option<u32>,
        #[arg(long)]
        benchmark_requests: Option<u32>,
        #[arg(long)]
        runs: Option<u32>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long, env = "BENCH_ENGINE")]
        engine: Option<Engine>,
        /// Skip `docker stats` collection
        #[arg(long)]
        no_docker_stats: bool,
        /// Artifact path (default: <raw-dir>/<framework>.json)
        #[arg(long)]
        out_file: Option<PathBuf>,
    },
    /// Send one batch of requests; fails if none succeed
    Batch {
        #[arg(long)]
        url: String,
        #[arg(long)]
        requests: u32,
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },
    /// Validate the structure of every raw artifact
    RawCheck {
        /// JSON schema whose properties.schema_version.const pins the version
        #[arg(long)]
        raw_schema: Option<PathBuf>,
    },
    /// Validate aggregate statistics and units of successful targets
    StatsCheck,
    /// Validate summary.json, including per-target uncertainty
    SummaryCheck {
        /// Summary to validate (default: <results-root>/summary.json)
        #[arg(long)]
        summary_file: Option<PathBuf>,
        /// JSON schema whose properties.schema_version.const pins the version
        #[arg(long)]
        summary_schema: Option<PathBuf>,
    },
    /// Gate on coefficient of variation per metric
    VarianceCheck {
        #[arg(long)]
        summary_file: Option<PathBuf>,
    },
    /// Compare every target against the baseline framework
    BenchstatCheck {
        #[arg(long)]
        out_file: Option<PathBuf>,
    },
    /// Variance and regression gates combined
    CiCheck {
        #[arg(long)]
        summary_file: Option<PathBuf>,
    },
    /// Write summary.json and report.md
    Report {
        #[arg(long)]
        summary_file: Option<PathBuf>,
        #[arg(long)]
        report_file: Option<PathBuf>,
        /// Also print the summary to stdout
        #[arg(long)]
        console: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let policy = Policy::load(&args.policy)?;
    let mut layout = ResultsLayout::new(&args.results_root);
    if let Some(raw_dir) = args.raw_dir {
        layout = layout.with_raw_dir(raw_dir);
    }

    match args.command {
        Command::Measure {
            framework,
            target,
            endpoint,
            parity,
            warmup_requests,
            benchmark_requests,
            runs,
            timeout_ms,
            engine,
            no_docker_stats,
            out_file,
        } => {
            let mut config = policy.sampler.clone();
            if let Some(v) = warmup_requests {
                config.warmup_requests = v;
            }
            if let Some(v) = benchmark_requests {
                config.benchmark_requests = v;
            }
            if let Some(v) = runs {
                config.runs = v;
            }
            if let Some(v) = timeout_ms {
                config.timeout = Duration::from_millis(v);
            }
            if let Some(v) = engine {
                config.engine = v;
            }
            if no_docker_stats {
                config.collect_docker_stats = false;
            }

            let out_file =
                out_file.unwrap_or_else(|| layout.raw_dir.join(format!("{}.json", framework)));
            let target = Target::new(&framework, &target, &endpoint, &parity);
            let sampler = Sampler::new(config, policy.quality.clone())?;
            sampler.measure_to_file(&target, &out_file).await?;
            info!("Wrote: {}", out_file.display());
        }
        Command::Batch {
            url,
            requests,
            timeout_ms,
        } => {
            let probe = ReqwestProbe::new()?;
            batch(&probe, &url, requests, Duration::from_millis(timeout_ms)).await?;
        }
        Command::RawCheck { raw_schema } => {
            let validated = checks::raw_schema_check(&layout.raw_dir, raw_schema.as_deref())?;
            println!("raw-check: validated {} raw artifact(s)", validated);
        }
        Command::StatsCheck => {
            let report = checks::stats_check(&layout.raw_dir)?;
            println!("{}", report.message());
        }
        Command::SummaryCheck {
            summary_file,
            summary_schema,
        } => {
            let summary_file =
                summary_file.unwrap_or_else(|| layout.results_root.join("summary.json"));
            let targets =
                checks::summary_schema_check(&summary_file, summary_schema.as_deref())?;
            println!("summary-check: validated {} target(s)", targets);
        }
        Command::VarianceCheck { summary_file } => {
            let summary = checks::variance_check(&layout, &policy, summary_file.as_deref())?;
            println!(
                "variance-check: {:?} for {} target(s)",
                summary.status,
                summary.targets.len()
            );
        }
        Command::BenchstatCheck { out_file } => {
            let comparator = RegressionComparator::new(Benchstat::new(&policy.regression.tool));
            let summary =
                checks::benchstat_check(&layout, &policy, &comparator, out_file.as_deref())
                    .await?;
            println!(
                "benchstat-check: {:?} ({} comparison(s))",
                summary.status,
                summary.comparisons.len()
            );
        }
        Command::CiCheck { summary_file } => {
            let comparator = RegressionComparator::new(Benchstat::new(&policy.regression.tool));
            let summary =
                checks::ci_check(&layout, &policy, comparator, summary_file.as_deref()).await?;
            println!("ci-check: {:?}", summary.status);
        }
        Command::Report {
            summary_file,
            report_file,
            console,
        } => {
            let summary =
                reporter::generate_report(&layout, summary_file.as_deref(), report_file.as_deref())
                    .context("Failed to generate report")?;
            if console {
                Reporter::new(OutputFormat::Console).report(&summary)?;
            }
        }
    }
    Ok(())
}

async fn batch<P: HttpProbe>(
    probe: &P,
    url: &str,
    requests: u32,
    timeout: Duration,
) -> anyhow::Result<()> {
    let outcome = run_batch(probe, url, requests, timeout).await;
    if outcome.successes() == 0 {
        anyhow::bail!("all {} requests to {} failed", requests, url);
    }
    info!(
        "{} of {} requests succeeded",
        outcome.successes(),
        requests
    );
    Ok(())
}
