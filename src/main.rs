//! reverie - self-tuning daily generation pipeline

use clap::Parser;
use reverie::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // WARN by default, INFO with -v; RUST_LOG directives still apply
    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.into())
        )
        .init();

    let code = cli::run(cli).await?;
    std::process::exit(code);
}
