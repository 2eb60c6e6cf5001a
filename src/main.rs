use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetcrawl::commands::{self, CrawlParams};
use fleetcrawl::config::Config;
use fleetcrawl::coordinator::FailurePolicy;

#[derive(Parser)]
#[command(
    name = "fleetcrawl",
    version,
    about = "Sharded web crawling across a fleet of nodes with pooled headless browsers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crawler node
    Node {
        /// Bind address (overrides node.bind_address)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run the load balancer in front of crawler nodes
    Balancer {
        /// Bind address (overrides balancer.bind_address)
        #[arg(short, long)]
        bind: Option<String>,

        /// Crawler node base address; repeat in shard order
        #[arg(short, long = "endpoint")]
        endpoints: Vec<String>,

        /// File with one node base address per line
        #[arg(long)]
        endpoints_file: Option<PathBuf>,

        /// Return partial results when a shard fails
        #[arg(long)]
        partial: bool,
    },

    /// Crawl one batch through the fleet and print the result as JSON
    Crawl {
        /// URLs to crawl
        #[arg(required = true)]
        urls: Vec<String>,

        /// Render pages in the headless browser
        #[arg(long)]
        js: bool,

        /// Print processed pages (title, content, headings) instead of HTML
        #[arg(long)]
        processed: bool,

        /// Crawler node base address; repeat in shard order
        #[arg(short, long = "endpoint")]
        endpoints: Vec<String>,

        /// File with one node base address per line
        #[arg(long)]
        endpoints_file: Option<PathBuf>,

        /// Print the pages of healthy shards when a shard fails
        #[arg(long)]
        partial: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    if let Err(e) = fleetcrawl::metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.node.threads.max(1))
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    match cli.command {
        Commands::Node { bind } => {
            tracing::info!(bind = ?bind, "Starting node command");
            runtime.block_on(commands::node(config, bind))?;
        }

        Commands::Balancer {
            bind,
            endpoints,
            endpoints_file,
            partial,
        } => {
            apply_endpoints(&mut config, endpoints, endpoints_file);
            if partial {
                config.balancer.failure_policy = FailurePolicy::Partial;
            }
            tracing::info!(bind = ?bind, "Starting balancer command");
            runtime.block_on(commands::balancer(config, bind))?;
        }

        Commands::Crawl {
            urls,
            js,
            processed,
            endpoints,
            endpoints_file,
            partial,
        } => {
            apply_endpoints(&mut config, endpoints, endpoints_file);
            if partial {
                config.balancer.failure_policy = FailurePolicy::Partial;
            }
            tracing::info!(urls = urls.len(), js = js, "Starting crawl command");
            let params = CrawlParams {
                urls,
                render_js: js,
                processed,
            };
            let json = runtime.block_on(commands::crawl(&config, params))?;
            println!("{json}");
        }
    }

    tracing::info!("fleetcrawl completed successfully");
    Ok(())
}

/// Command-line endpoints replace the configured ones
fn apply_endpoints(config: &mut Config, endpoints: Vec<String>, endpoints_file: Option<PathBuf>) {
    if !endpoints.is_empty() || endpoints_file.is_some() {
        config.balancer.endpoints = endpoints;
        config.balancer.endpoints_file = endpoints_file;
    }
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("fleetcrawl=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("fleetcrawl={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
