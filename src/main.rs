use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nihongo_cli::cli::{self, Cli};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nihongo_cli=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Cli::parse();
    if let Err(error) = cli::run(args) {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}
