use anyhow::Result;
use awg_ramp::{app::App, args::Args};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!(
        "awg-ramp {} (git {})",
        env!("CARGO_PKG_VERSION"),
        git_version::git_version!(fallback = "unknown")
    );
    App::new(&Args::parse()).await?.run().await
}
