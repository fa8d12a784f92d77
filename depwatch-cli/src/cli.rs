use std::path::PathBuf;

use clap::Parser;

/// Check configured repositories for outdated dependencies and open
/// security advisories, then email a prioritized report
#[derive(Parser)]
#[command(name = "depwatch", version)]
pub struct Cli {
    /// Path to the YAML file listing repositories to check
    #[arg(short, long, default_value = "depwatch.yml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}
