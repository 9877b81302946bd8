//! GeoTIFF viewer service.
//!
//! Accepts GeoTIFF uploads, renders PNG previews with WGS84 bounds and merges
//! selected uploads into a composite.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use viewer_api::{build_router, AppState, ViewerConfig};

#[derive(Parser, Debug)]
#[command(name = "viewer-api")]
#[command(about = "GeoTIFF upload, preview and composite server")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "VIEWER_LISTEN", default_value = "0.0.0.0:8000")]
    listen: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory holding uploads, previews and the composite
    #[arg(long, env = "MEDIA_ROOT", default_value = "media")]
    media_root: PathBuf,

    /// URL path the media directory is served under
    #[arg(long, env = "MEDIA_URL", default_value = "/media")]
    media_url: String,

    /// SQLite URL of the image catalog (default: viewer.db in the media root)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Largest accepted file, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = viewer_api::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,

    /// Map tile key passed to the gallery client
    #[arg(long, env = "MAPTILER_KEY", default_value = "")]
    map_key: String,
}

impl Args {
    fn into_config(self) -> ViewerConfig {
        let mut config = ViewerConfig::new(self.media_root);
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        config.media_url = self.media_url;
        config.listen = self.listen;
        config.max_upload_bytes = self.max_upload_bytes;
        config.map_key = self.map_key;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Prometheus metrics exporter initialized");
    info!("Starting GeoTIFF viewer server");

    let config = args.into_config();
    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen))?;

    let state = Arc::new(AppState::new(config).await?);
    let app = build_router(state, prometheus_handle);

    info!(address = %addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
