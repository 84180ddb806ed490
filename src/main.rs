//! Filing-Finder main entry point
//!
//! This is the command-line interface for report discovery and line item
//! consolidation.

use anyhow::Context;
use clap::Parser;
use filing_finder::config::{load_companies, load_config_with_hash, CompanyEntry, Config};
use filing_finder::crawler::{run_discovery, Coordinator, HttpFetcher};
use filing_finder::output::{
    load_statistics, print_statistics, write_consolidated, write_quality, write_registry,
};
use filing_finder::pipeline::{
    build_registry, consolidate_directory, record_consolidation, record_discovery,
};
use filing_finder::storage::open_storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Filing-Finder: annual report discovery and line item reconciliation
///
/// By default Filing-Finder crawls each company's investor-relations site,
/// ranks the annual report documents it finds per year and writes the
/// registry. With --consolidate it instead merges extracted line items
/// and scores their quality.
#[derive(Parser, Debug)]
#[command(name = "filing-finder")]
#[command(version = "1.0.0")]
#[command(about = "Annual report discovery and line item reconciliation", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// JSON file of companies to search instead of the config's [[company]] list
    #[arg(long, value_name = "FILE")]
    companies: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "consolidate"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "consolidate"])]
    stats: bool,

    /// Consolidate the extracted line item CSV files under DIR
    #[arg(long, value_name = "DIR", conflicts_with_all = ["dry_run", "stats"])]
    consolidate: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    if let Some(dir) = &cli.consolidate {
        return handle_consolidate(&config, &config_hash, dir);
    }

    let companies = match &cli.companies {
        Some(path) => load_companies(path)
            .with_context(|| format!("failed to load companies from {}", path.display()))?,
        None => config.company.clone(),
    };
    if companies.is_empty() {
        anyhow::bail!("no companies to search: add [[company]] entries or pass --companies");
    }

    if cli.dry_run {
        handle_dry_run(&config, &companies);
        Ok(())
    } else {
        handle_discovery(&config, &config_hash, &companies).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("filing_finder=info,warn"),
            1 => EnvFilter::new("filing_finder=debug,info"),
            2 => EnvFilter::new("filing_finder=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, companies: &[CompanyEntry]) {
    println!("=== Filing-Finder Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max concurrent fetches: {}", config.crawler.max_concurrent_fetches);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Max pages per company: {}", config.crawler.max_pages);
    println!("  Time budget per company: {}s", config.crawler.time_budget_secs);
    println!("  Years back: {}", config.crawler.years_back);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nRanking:");
    println!("  Best margin: {}", config.ranking.best_margin);
    println!("  Min score: {}", config.ranking.min_score);
    println!("  Max secondary: {}", config.ranking.max_secondary);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Registry: {}", config.output.registry_path);

    println!("\nCompanies ({}):", companies.len());
    for company in companies {
        println!("  - {} [{}] {}", company.name, company.ticker, company.root_url);
        for host in &company.allowed_hosts {
            println!("    * also follows {}", host);
        }
    }

    println!("\nDenied Domains ({}):", config.policy.deny_domains.len());
    for pattern in &config.policy.deny_domains {
        println!("  - {}", pattern);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would search {} companies", companies.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --consolidate mode: merges and scores extracted line items
fn handle_consolidate(config: &Config, config_hash: &str, dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("input path is not a directory: {}", dir.display());
    }

    let outcome = consolidate_directory(dir, &config.consolidation)
        .with_context(|| format!("failed to consolidate {}", dir.display()))?;

    let mut storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let run_id = record_consolidation(&mut storage, config_hash, &outcome)?;

    write_consolidated(Path::new(&config.output.consolidated_path), &outcome.result.items)?;
    write_quality(Path::new(&config.output.quality_path), &outcome.quality)?;

    println!("=== Consolidation Complete (run {}) ===\n", run_id);
    println!("  Files read: {}", outcome.files_read);
    println!("  Files skipped: {}", outcome.files_failed.len());
    println!("  Consolidated items: {}", outcome.result.items.len());
    println!("  Conflicts: {}", outcome.result.conflict_count());
    println!("  Unmapped terms: {}", outcome.result.unmapped_count());
    println!("  Quality reports: {}", outcome.quality.len());
    println!("\n✓ Items written to: {}", config.output.consolidated_path);
    println!("✓ Quality summary written to: {}", config.output.quality_path);

    Ok(())
}

/// Handles the default mode: crawls, ranks and writes the registry
async fn handle_discovery(
    config: &Config,
    config_hash: &str,
    companies: &[CompanyEntry],
) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::from_config(&config.crawler, &config.user_agent)
        .context("failed to build HTTP client")?;
    let coordinator = Coordinator::new(config, Arc::new(fetcher));
    let window = coordinator.window();
    tracing::info!(
        "Searching {} companies for reports from {} to {}",
        companies.len(),
        window.min,
        window.max
    );

    let reports = run_discovery(&coordinator, companies).await;
    let registry = build_registry(&reports, &config.ranking, window);

    let mut storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let run_id = record_discovery(&mut storage, config_hash, &reports, &registry)?;

    write_registry(Path::new(&config.output.registry_path), &registry)?;

    let info = &registry.discovery_info;
    println!("=== Discovery Complete (run {}) ===\n", run_id);
    println!("  Companies: {}", info.total_companies);
    println!("  Best reports: {}", info.total_best_reports);
    println!("  Secondary reports: {}", info.total_secondary_reports);
    if reports.iter().any(|r| r.cancelled) {
        println!("  Some crawls hit the page or time budget; results are partial");
    }
    println!("\n✓ Registry written to: {}", config.output.registry_path);

    Ok(())
}
