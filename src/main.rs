//! `log_replay` command-line tool.
//!
//! Replays the `GET` requests of an access log against `BASE_URL`, keeping the
//! original spacing between requests.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use log_replay::config::{PoolConfig, ReplayConfig, APACHE_COMBINED_FORMAT, APACHE_DATE_FORMAT};
use log_replay::runtime::{run_from_config, ReplayReport};
use log_replay::util::init_tracing_with_verbosity;

/// Replay an HTTP access log with its original timing.
#[derive(Debug, Parser)]
#[command(name = "log_replay", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// strftime format of the `%t` field.
    #[arg(short = 'F', long = "logdateformat", default_value = APACHE_DATE_FORMAT)]
    log_date_format: String,

    /// Apache `LogFormat` description of each line.
    #[arg(short = 'f', long = "logformat", default_value = APACHE_COMBINED_FORMAT)]
    log_format: String,

    /// Seconds between start and the first replayed request.
    #[arg(short = 'd', long = "delaystart", default_value_t = 1)]
    delay_start: u64,

    /// Lateness tolerance in seconds before the pool grows (negative allows lateness).
    #[arg(
        short = 't',
        long = "maximum-time-delta",
        default_value_t = -0.5,
        allow_negative_numbers = true
    )]
    maximum_time_delta: f64,

    /// Dispatchers started up front.
    #[arg(short = 'w', long = "initial-workers", default_value_t = 50)]
    initial_workers: usize,

    /// Pool floor.
    #[arg(long, default_value_t = 1)]
    min_workers: usize,

    /// Pool ceiling.
    #[arg(long, default_value_t = 500)]
    max_workers: usize,

    /// Per-request timeout in seconds.
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Runtime worker threads (defaults to the number of CPUs).
    #[arg(long)]
    threads: Option<usize>,

    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,

    /// Target to replay against, e.g. `http://localhost:8080`.
    #[arg(value_name = "BASE_URL")]
    base_url: String,

    /// Access log to replay.
    #[arg(value_name = "LOG_FILE")]
    log_file: PathBuf,
}

impl Cli {
    fn to_config(&self) -> ReplayConfig {
        let pool = PoolConfig::default()
            .with_workers(self.min_workers, self.initial_workers, self.max_workers)
            .with_maximum_time_delta(self.maximum_time_delta);

        let mut config = ReplayConfig::new(self.base_url.clone())
            .with_start_delay_secs(self.delay_start)
            .with_pool(pool);
        config.log_format.clone_from(&self.log_format);
        config.date_format.clone_from(&self.log_date_format);
        config.request_timeout_secs = self.request_timeout;
        config
    }
}

fn print_report(report: &ReplayReport) {
    let stats = &report.stats;
    println!("run {}", report.run_id);
    println!("  scheduled:   {}", stats.scheduled);
    println!("  succeeded:   {}", stats.succeeded);
    println!(
        "  failed:      {} ({} transient, {} unexpected)",
        stats.failed(),
        stats.transient_failures,
        stats.unexpected_failures
    );
    println!("  discarded:   {}", stats.discarded);
    println!("  skipped:     {}", report.skipped.total());
    println!("  late:        {} (worst {} ms)", stats.late_dispatches, stats.worst_lag_ms);
    println!("  peak pool:   {}", stats.peak_workers);
    println!("  elapsed:     {} ms", report.elapsed_ms);
    if report.shutdown_requested {
        println!("  interrupted by shutdown request");
    }
}

fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing_with_verbosity(cli.verbose);

    let config = cli.to_config();
    let threads = cli.threads.unwrap_or_else(num_cpus::get).max(1);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let report = runtime.block_on(run_from_config(config, &cli.log_file, async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        tracing::warn!("interrupt received, shutting down");
    }))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        print_report(&report);
    }
    Ok(())
}
