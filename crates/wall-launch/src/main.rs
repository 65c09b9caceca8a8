//! Display wall launcher entry point.
//!
//! ```text
//! wall-launch [--config display-wall.toml] [--frames N] [--clients N] [--head-node]
//! ```
//!
//! Loads the configuration (defaults if the file does not exist), applies
//! command-line overrides, runs the whole wall in this process and reports
//! how long the configured frames took. Ctrl-C stops the run early.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wall_launch::launch;
use wall_service::infrastructure::storage::config::{default_config_path, load_config};

/// Command-line arguments. Anything given here overrides the config file.
#[derive(Debug, Parser)]
#[command(
    name = "wall-launch",
    about = "Run a display wall service and test renderers in one process",
    version
)]
struct Cli {
    /// Configuration file; defaults to `display-wall.toml` in the working directory.
    #[arg(long, short, env = "WALL_CONFIG")]
    config: Option<PathBuf>,

    /// Number of frames to render.
    #[arg(long)]
    frames: Option<u64>,

    /// Number of render client ranks.
    #[arg(long)]
    clients: Option<usize>,

    /// Relay all tiles through a head node.
    #[arg(long)]
    head_node: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(default_config_path);
    let mut config = load_config(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    if let Some(frames) = cli.frames {
        config.render.frames = frames;
    }
    if let Some(clients) = cli.clients {
        config.render.clients = clients;
    }
    config.service.head_node |= cli.head_node;

    // `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();
    info!(path = %path.display(), "configuration loaded");

    tokio::select! {
        report = launch(&config) => {
            let report = report.context("display wall run failed")?;
            info!(
                frames = config.render.frames,
                displays = report.frames_per_display.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                info_addr = %report.info_addr,
                "all frames presented"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }
    Ok(())
}
