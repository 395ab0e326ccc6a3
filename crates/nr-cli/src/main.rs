use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nr_cli::app;
use nr_cli::Args;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let stdout = std::io::stdout();
    app::run(&args, &mut stdout.lock())
}
