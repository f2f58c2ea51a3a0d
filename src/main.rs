//! Head Start CLI
//!
//! Online migraine-risk engine: serve the HTTP boundary, replay synthetic
//! streams, and inspect the feature pipeline.

use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use headstart_engine::{
    config::Config,
    core::features::produced_feature_names,
    FeaturePipeline, LogisticScorer, Scorer, StoreCoordinator, StoreError, StoreSettings,
    SyntheticUser, VERSION,
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "headstart")]
#[command(version = VERSION)]
#[command(about = "Online feature windowing and risk prediction caching", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the ingest/predict HTTP API until Ctrl+C
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Model bundle path (overrides config)
        #[arg(long)]
        bundle: Option<PathBuf>,
    },

    /// Feed a synthetic stream through a fresh store and print the result
    Simulate {
        /// User identifier
        #[arg(long, default_value = "user_001")]
        user: String,

        /// Number of one-minute samples to generate
        #[arg(long, default_value = "240")]
        minutes: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Model bundle path (overrides config)
        #[arg(long)]
        bundle: Option<PathBuf>,
    },

    /// List pipeline features, and which bundle features are never produced
    Features {
        /// Model bundle to check against
        #[arg(long)]
        bundle: Option<PathBuf>,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config.log_level);

    let result = match cli.command {
        Commands::Serve { port, host, bundle } => cmd_serve(config, port, host, bundle).await,
        Commands::Simulate {
            user,
            minutes,
            seed,
            bundle,
        } => cmd_simulate(config, &user, minutes, seed, bundle).await,
        Commands::Features { bundle } => cmd_features(bundle.as_deref()),
        Commands::Config => {
            cmd_config(&config);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_store(config: &Config, bundle: Option<PathBuf>) -> anyhow::Result<Arc<StoreCoordinator>> {
    let bundle_path = bundle.unwrap_or_else(|| config.model_bundle_path.clone());
    let scorer = LogisticScorer::load(&bundle_path)
        .map_err(|e| anyhow::anyhow!("failed to load model bundle: {e}"))?;
    tracing::info!(
        path = %bundle_path.display(),
        features = scorer.feature_names().len(),
        "model bundle loaded"
    );

    let settings = StoreSettings {
        max_events_per_user: config.max_events_per_user,
        max_insights: config.max_insights,
        timezone: config.timezone()?,
    };
    Ok(Arc::new(StoreCoordinator::new(Arc::new(scorer), settings)))
}

#[cfg(feature = "server")]
async fn cmd_serve(
    mut config: Config,
    port: Option<u16>,
    host: IpAddr,
    bundle: Option<PathBuf>,
) -> anyhow::Result<()> {
    use headstart_engine::server::{self, ServerConfig};

    if let Some(port) = port {
        config.port = port;
    }
    let store = build_store(&config, bundle)?;
    let server_config = ServerConfig::from_config(&config).with_host(host);

    let listener =
        tokio::net::TcpListener::bind((server_config.host, server_config.port)).await?;
    println!("Head Start v{VERSION}");
    println!("Listening on http://{}", listener.local_addr()?);
    println!("Press Ctrl+C to stop.");

    server::serve(listener, server_config, store, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    })
    .await?;

    println!("Stopped.");
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn cmd_serve(
    _config: Config,
    _port: Option<u16>,
    _host: IpAddr,
    _bundle: Option<PathBuf>,
) -> anyhow::Result<()> {
    anyhow::bail!("this build does not include the server feature")
}

async fn cmd_simulate(
    config: Config,
    user: &str,
    minutes: usize,
    seed: u64,
    bundle: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = build_store(&config, bundle)?;
    let start = Utc::now() - ChronoDuration::minutes(minutes as i64);
    let mut failures = 0usize;
    for sample in SyntheticUser::new(user, seed, start).take(minutes) {
        match store.ingest(sample).await {
            Ok(_) => {}
            Err(StoreError::Scorer(e)) => {
                failures += 1;
                tracing::warn!(error = %e, "scoring failed for synthetic sample");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let (entry, recommendations) = store.get_coaching(user)?;
    println!("Simulated {minutes} minute(s) for {user} (seed {seed})");
    if failures > 0 {
        println!("  Scoring failures: {failures}");
    }
    println!("  Probability: {:.3}", entry.probability);
    println!("  Risk level: {}", entry.risk_level);
    println!("  Computed at: {}", entry.computed_at.to_rfc3339());
    println!();
    println!("Insights:");
    for insight in &entry.insights {
        println!("  - {insight}");
    }
    println!();
    println!("Recommendations:");
    for recommendation in recommendations {
        println!("  - {recommendation}");
    }
    Ok(())
}

fn cmd_features(bundle: Option<&Path>) -> anyhow::Result<()> {
    let produced = produced_feature_names();
    println!("Pipeline features ({}):", produced.len());
    for name in &produced {
        println!("  {name}");
    }

    if let Some(path) = bundle {
        let scorer = LogisticScorer::load(path)
            .map_err(|e| anyhow::anyhow!("failed to load model bundle: {e}"))?;
        let pipeline = FeaturePipeline::new(scorer.feature_names().to_vec());
        let unproduced = pipeline.unproduced_features();

        println!();
        println!(
            "Bundle requests {} feature(s); {} never produced:",
            scorer.feature_names().len(),
            unproduced.len()
        );
        for name in unproduced {
            println!("  {name}");
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}
