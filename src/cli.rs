use crate::alias_table::AliasTable;
use crate::app_state::AppState;
use crate::artifact_store::ArtifactStore;
use crate::config_loader::{load_config, ServiceConfig};
use crate::log_sink::init_tracing;
use crate::prediction_service::PredictionService;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const CONFIG_ENV: &str = "CARPRICE_CONFIG";

/// Top-level CLI for the prediction service
#[derive(Parser)]
#[command(name = "carprice", version, about = "Used car price prediction service")]
pub struct Cli {
    /// Path to a TOML config file (defaults to carprice.toml, or $CARPRICE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Host/IP to bind, overriding the config file
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding the config file
        #[arg(long)]
        port: Option<u16>,
    },

    /// Load the artifact bundle and report whether it can serve
    Check,

    /// Print the effective configuration as JSON
    ShowConfig,
}

impl Cli {
    fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }
}

/// Build the service the way `serve` does: aliases from config, one load
/// attempt, schema bound against the alias table.
pub fn build_service(config: &ServiceConfig) -> anyhow::Result<PredictionService> {
    let aliases = AliasTable::with_extra(&config.extra_aliases).context("invalid alias table")?;
    let store = ArtifactStore::open(&config.artifact_dir);
    Ok(PredictionService::start(store, aliases, config.reference_year))
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    let mut config = load_config(config_path.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            init_tracing(&config.log_level);
            serve(config)
        }
        Commands::Check => {
            init_tracing(&config.log_level);
            let service = build_service(&config)?;
            match service.model_info() {
                Ok(info) if service.is_loaded() => {
                    println!("{}", serde_json::to_string_pretty(&info)?);
                    Ok(())
                }
                _ => anyhow::bail!(
                    "artifacts in {} cannot serve: {}",
                    config.artifact_dir.display(),
                    service.load_error().unwrap_or("unknown error")
                ),
            }
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let service = build_service(&config)?;
    let state = Arc::new(AppState::new(service));
    let app = crate::web::build_router(state, &config.allowed_origins);
    let addr = config.bind_addr();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")?;

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("HTTP server listening on http://{addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
