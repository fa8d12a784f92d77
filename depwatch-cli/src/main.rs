mod cli;

use std::process;

use clap::Parser;
use tracing::error;

use cli::Cli;
use depwatch::config::{Config, Credentials};

fn init_tracing(args: &Cli) {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(args.verbosity.tracing_level_filter().into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(&args);

    let config = match Config::load(&args.config, Credentials::from_env()) {
        Ok(config) => config,
        Err(e) => {
            let chain = format!("{e:#}");
            error!(error = %chain, "failed to load configuration");
            process::exit(1);
        }
    };

    if let Err(e) = depwatch::run(&config).await {
        let chain = format!("{e:#}");
        error!(error = %chain, "run failed");
        process::exit(1);
    }
}
