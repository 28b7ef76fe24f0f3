mod cli;
mod commands;

use std::process;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --debug wins over --log-level; RUST_LOG wins over both
    let level = if cli.global.debug {
        "debug"
    } else {
        cli.global.log_level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        cli::Commands::Info(args) => commands::info::execute(args, &cli.global).await,
        cli::Commands::Render(args) => commands::render::execute(args, &cli.global).await,
        cli::Commands::EnsureMount(args) => {
            commands::ensure_mount::execute(args, &cli.global).await
        }
        cli::Commands::Publish(args) => commands::publish::execute(args, &cli.global).await,
        cli::Commands::Unpublish(args) => commands::unpublish::execute(args, &cli.global).await,
        cli::Commands::Stats(args) => commands::stats::execute(args, &cli.global).await,
    };

    if let Err(error) = result {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}
