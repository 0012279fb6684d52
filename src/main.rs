//! WebSpider main entry point
//!
//! This is the command-line interface for the WebSpider crawl frontier.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use webspider::config::{load_config_with_hash, Config, CrawlMode};
use webspider::crawler::{CrawlSummary, Orchestrator};
use webspider::output::{load_statistics, print_statistics};
use webspider::storage::{Frontier, FrontierOptions, SqliteFrontier};

/// WebSpider: a resumable, multi-worker web crawler
///
/// WebSpider keeps its crawl frontier in SQLite, so any number of workers
/// (in this process or others) can share it, and an interrupted crawl picks
/// up where it left off.
#[derive(Parser, Debug)]
#[command(name = "webspider")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, multi-worker web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured number of workers
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=256))]
    workers: Option<u32>,

    /// Keep polling for new URLs instead of exiting when the frontier drains
    #[arg(long)]
    continuous: bool,

    /// Do not insert the configured seeds before crawling
    #[arg(long)]
    no_seed: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, group = "command")]
    dry_run: bool,

    /// Show frontier statistics and exit
    #[arg(long, group = "command")]
    stats: bool,

    /// Insert a URL at depth 0 and exit (repeatable)
    #[arg(long, value_name = "URL", group = "command")]
    seed: Vec<String>,

    /// Return stale claims to pending and exit
    #[arg(long, group = "command")]
    reclaim: bool,

    /// Return failed URLs to pending and exit
    #[arg(long, group = "command")]
    reset_failed: bool,

    /// Only reset failed URLs containing this text
    #[arg(long, value_name = "TEXT", requires = "reset_failed")]
    matching: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if cli.continuous {
        config.crawler.mode = CrawlMode::Continuous;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if !cli.seed.is_empty() {
        handle_seed(&config, &cli.seed)?;
    } else if cli.reclaim {
        handle_reclaim(&config)?;
    } else if cli.reset_failed {
        handle_reset_failed(&config, cli.matching.as_deref())?;
    } else {
        handle_crawl(config, config_hash, !cli.no_seed).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webspider=info,warn"),
            1 => EnvFilter::new("webspider=debug,info"),
            2 => EnvFilter::new("webspider=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_frontier(config: &Config) -> Result<SqliteFrontier> {
    FrontierOptions::from_config(config)
        .open_blocking()
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== WebSpider Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Workers: {}", config.crawler.workers);
    println!("  Mode: {:?}", config.crawler.mode);
    println!("  Idle poll: {}ms", config.crawler.idle_poll_ms);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nFrontier:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Lease timeout: {}s", config.reclaim.timeout_secs);
    println!("  Reclaim interval: {}s", config.reclaim.interval_secs);
    println!("  Shutdown grace: {}s", config.shutdown.grace_secs);

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    match &config.fetch.archive_dir {
        Some(dir) => println!("  Archive: {}", dir),
        None => println!("  Archive: disabled"),
    }
    match config.fetch.render_pool_size {
        Some(size) => println!("  Render pool: {} slots", size),
        None => println!("  Render pool: unbounded"),
    }
    println!("  Content keywords: {}", config.fetch.content_keywords.len());
    println!("  Title keywords: {}", config.fetch.title_keywords.len());

    println!("\nFilter:");
    if config.filter.allowed_domains.is_empty() {
        println!("  Allowed domains: any");
    } else {
        println!("  Allowed domains: {}", config.filter.allowed_domains.join(", "));
    }
    println!("  Denied extensions: {}", config.filter.denied_extensions.len());
    println!("  Denied patterns: {}", config.filter.denied_patterns.len());
    if let Some(file) = &config.filter.denied_patterns_file {
        println!("  Denied patterns file: {}", file);
    }
    println!("  URL keywords: {}", config.filter.url_keywords.len());

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start {} workers with {} seed URLs",
        config.crawler.workers,
        config.seeds.len()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let frontier = open_frontier(config)?;
    let stats = load_statistics(&frontier)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --seed: inserts URLs at depth 0
fn handle_seed(config: &Config, seeds: &[String]) -> Result<()> {
    let mut frontier = open_frontier(config)?;

    for seed in seeds {
        if frontier.insert(seed, None, 0)? {
            println!("+ {}", seed);
        } else {
            println!("= {} (already known or not admitted)", seed);
        }
    }

    println!("\n{}", frontier.stats()?);
    Ok(())
}

/// Handles --reclaim: one lease sweep
fn handle_reclaim(config: &Config) -> Result<()> {
    let mut frontier = open_frontier(config)?;
    let reclaimed = frontier.reclaim_stale(config.reclaim.timeout())?;

    println!(
        "Reclaimed {} claim(s) older than {}s",
        reclaimed, config.reclaim.timeout_secs
    );
    Ok(())
}

/// Handles --reset-failed: returns failed URLs to pending
fn handle_reset_failed(config: &Config, matching: Option<&str>) -> Result<()> {
    let mut frontier = open_frontier(config)?;
    let reset = frontier.reset_failed(matching)?;

    match matching {
        Some(text) => println!("Reset {} failed URL(s) containing '{}'", reset, text),
        None => println!("Reset {} failed URL(s)", reset),
    }
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, seed: bool) -> Result<()> {
    let seeds = config.seeds.clone();
    let orchestrator = Orchestrator::from_config(config)
        .context("Failed to build crawler")?
        .with_config_hash(config_hash);

    if seed {
        orchestrator.seed(&seeds).await.context("Failed to seed frontier")?;
    } else {
        tracing::info!("Skipping configured seeds");
    }

    let summary = orchestrator.run().await.context("Crawl failed")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CrawlSummary) {
    println!("\n=== Run #{} {} ===", summary.run_id, summary.status.to_db_string());
    println!(
        "Resolved {} URL(s) in {:.1}s ({} ok, {} failed, {} new links)",
        summary.processed,
        summary.elapsed.as_secs_f64(),
        summary.succeeded,
        summary.failed,
        summary.discovered
    );
    if summary.reclaimed_at_start > 0 {
        println!("Recovered {} stale claim(s) at startup", summary.reclaimed_at_start);
    }
    println!("Frontier: {}", summary.stats);
}
