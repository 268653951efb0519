//! APEX Admin CLI
//!
//! Administrative CLI for pool/registry introspection: connection health,
//! circuit breaker state, and enrichment lookup cache occupancy. Mirrors
//! the reporting style of `bin/apex.rs`.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use apex_engine::ServiceRegistry;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "apex-admin")]
#[command(about = "APEX Admin CLI - pool and registry introspection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root configuration document to load
    #[arg(long, default_value = "config/bootstrap.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show health, circuit breaker, and metrics for every data source and sink
    Health,
    /// Show lookup cache occupancy per enrichment
    CacheStats,
    /// Show counts of loaded rules, rule chains and enrichments
    Stats,
}

fn health_label(state: apex_engine::HealthState) -> colored::ColoredString {
    use apex_engine::HealthState::*;
    match state {
        Connected => "connected".green(),
        Degraded => "degraded".yellow(),
        Unhealthy | Error => "unhealthy".red(),
        Shutdown => "shutdown".red(),
        Connecting | NotInitialized => "initializing".yellow(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let registry = match ServiceRegistry::load(&cli.config).await {
        Ok(r) => r,
        Err(e) => {
            error!("❌ failed to load configuration at {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };
    let generation = registry.current();

    match cli.command {
        Commands::Health => {
            info!("🩺 data sources");
            for (name, backend) in &generation.data_sources {
                let breaker = if backend.breaker().is_open() { "open".red() } else { "closed".green() };
                println!(
                    "  {name}: health={} breaker={breaker} attempts={} failures={}",
                    health_label(backend.health().state()),
                    backend.metrics().connection_attempts.load(Ordering::Relaxed),
                    backend.metrics().connection_failures.load(Ordering::Relaxed),
                );
            }
            info!("🩺 data sinks");
            for (name, pool) in &generation.data_sinks {
                let breaker = if pool.breaker.is_open() { "open".red() } else { "closed".green() };
                println!(
                    "  {name}: breaker={breaker} batches_ok={} batches_failed={} batches_partial={}",
                    pool.metrics.batches_successful.load(Ordering::Relaxed),
                    pool.metrics.batches_failed.load(Ordering::Relaxed),
                    pool.metrics.batches_partial.load(Ordering::Relaxed),
                );
            }
        }
        Commands::CacheStats => {
            info!("💾 lookup cache occupancy");
            let stats = generation.processor.cache_stats();
            if stats.is_empty() {
                println!("  (no caches populated yet)");
            }
            for (enrichment_id, size) in stats {
                println!("  {enrichment_id}: {size} entries");
            }
        }
        Commands::Stats => {
            println!("rules: {}", generation.rules.len());
            println!("rule-chains: {}", generation.rule_chains.len());
            println!("enrichments: {}", generation.enrichments.len());
            println!("data-sources: {}", generation.data_sources.len());
            println!("data-sinks: {}", generation.data_sinks.len());
        }
    }
}
