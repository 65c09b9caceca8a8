//! `wall-info`: prints what a running display wall service reports about
//! itself.
//!
//! ```text
//! wall-info <host> <port>
//! ```
//!
//! The service's info responder answers every connection with its endpoint
//! name and the wall's total pixel size. An unreachable service is reported
//! with zero total pixels, and the tool exits with an error.

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wall_client::query_service_info;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "wall-info",
    about = "Query a running display wall service for its endpoint and size",
    version
)]
struct Cli {
    /// Host running the service's info responder.
    #[arg(env = "WALL_INFO_HOST")]
    host: String,

    /// Port of the info responder (`info_port` in the service config).
    #[arg(env = "WALL_INFO_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let info = query_service_info(&cli.host, cli.port).await;
    println!("endpoint:     {}", info.endpoint_name);
    println!(
        "total pixels: {}x{}",
        info.total_pixels.x, info.total_pixels.y
    );
    println!("stereo:       {}", info.stereo);

    if !info.is_available() {
        bail!("no display wall service answered at {}:{}", cli.host, cli.port);
    }
    Ok(())
}
