use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tntpool::config::Config;
use tntpool::core::{IteratorType, Mode};
use tntpool::pool::ConnectionPool;
use tntpool::sim::SimCluster;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tntpool")]
#[command(about = "A role-aware connection pool for master/replica clusters")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "tntpool team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pool against an in-memory cluster with random failovers
    Simulate {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
        /// Number of replicas among the configured addresses
        #[arg(long)]
        replicas: Option<usize>,
        /// Number of failover rounds
        #[arg(long, default_value_t = 5)]
        rounds: usize,
    },
    /// Generate example configuration files
    Config {
        /// Configuration profile (standalone or cluster)
        #[arg(short, long)]
        profile: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            replicas,
            rounds,
        } => simulate(config, replicas, rounds).await,
        Commands::Config { profile, output } => generate_config(profile, output),
        Commands::Validate { config } => validate_config(config),
        Commands::Version => {
            show_version();
            Ok(())
        }
    }
}

async fn simulate(config_path: PathBuf, replicas: Option<usize>, rounds: usize) -> Result<()> {
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config)?;

    let addrs = config.pool.addrs.clone();
    let replicas = replicas.unwrap_or(addrs.len().saturating_sub(1));
    if replicas > addrs.len() {
        bail!("{} replicas requested but only {} addresses configured", replicas, addrs.len());
    }

    // The first addresses are masters, the rest replicas.
    let cluster = SimCluster::new();
    let masters = addrs.len() - replicas;
    for (i, addr) in addrs.iter().enumerate() {
        cluster.add_node(addr, i >= masters);
    }
    if let Some(function) = &config.pool.discovery_function {
        cluster.register_function(function, vec![json!(addrs)]);
    }

    let options = config.pool.to_options();
    let settle = options.check_interval * 2;
    info!(
        "Starting tntpool v{} simulation with {} masters and {} replicas",
        env!("CARGO_PKG_VERSION"),
        masters,
        replicas
    );

    let pool = ConnectionPool::connect_with_opts(addrs.clone(), cluster.connector(), options)
        .await
        .context("Failed to connect pool")?;
    print_status(&pool, 0).await;

    let mut rng = StdRng::from_entropy();
    for round in 1..=rounds {
        for (i, mode) in [Mode::RW, Mode::PreferRW, Mode::PreferRO].into_iter().enumerate() {
            let key = format!("round-{}-{}", round, i);
            match pool.replace("sim", json!([key, round]), &[]).await {
                Ok(_) => {}
                Err(e) => warn!(error = %e, "write failed"),
            }
            match pool
                .select("sim", "primary", 0, 1, IteratorType::Eq, json!([key]), &[mode])
                .await
            {
                Ok(response) => info!(mode = %mode, rows = response.data.len(), "select routed"),
                Err(e) => warn!(mode = %mode, error = %e, "select failed"),
            }
        }

        let victim = &addrs[rng.gen_range(0..addrs.len())];
        if let Some(node) = cluster.node(victim) {
            if rng.gen_bool(0.25) {
                if node.is_running() {
                    info!(addr = %victim, "stopping instance");
                    node.stop();
                } else {
                    info!(addr = %victim, "starting instance");
                    node.start();
                }
            } else {
                let read_only = !node.is_read_only();
                info!(addr = %victim, read_only, "switching instance role");
                node.set_read_only(read_only);
            }
        }

        tokio::time::sleep(settle).await;
        print_status(&pool, round).await;
    }

    for error in pool.close().await {
        warn!(error = %error, "error while closing pool");
    }
    Ok(())
}

async fn print_status(pool: &ConnectionPool, round: usize) {
    let mut status: Vec<_> = pool.status().await.into_iter().collect();
    status.sort_by(|a, b| a.0.cmp(&b.0));

    println!("Round {}:", round);
    for (addr, info) in status {
        println!(
            "  {:<24} {:<8} {}",
            addr,
            info.role,
            if info.connected_now { "connected" } else { "disconnected" }
        );
    }
}

fn generate_config(profile: String, output: PathBuf) -> Result<()> {
    println!("Generating {} configuration file: {:?}", profile, output);

    Config::create_example_config(&output, &profile).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  tntpool simulate --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            let options = config.pool.to_options();
            println!("✓ Configuration file is valid");
            println!("  Instances: {}", config.pool.addrs.len());
            for (i, addr) in config.pool.addrs.iter().enumerate() {
                println!("    {}: {}", i + 1, addr);
            }
            println!("  Check interval: {:?}", options.check_interval);
            println!("  Probe timeout: {:?}", options.probe_timeout);
            match &options.discovery_function {
                Some(function) => println!(
                    "  Discovery: {} every {:?}",
                    function, options.discovery_interval
                ),
                None => println!("  Discovery: disabled"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            eprintln!("  {}", e);
            Err(e.into())
        }
    }
}

fn show_version() {
    println!("tntpool v{}", env!("CARGO_PKG_VERSION"));
    println!("A role-aware connection pool for master/replica clusters");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Request routing by mode: rw, prefer_rw, prefer_ro");
    println!("  • Automatic master/replica re-classification");
    println!("  • Reconnection and topology discovery in the background");
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}
