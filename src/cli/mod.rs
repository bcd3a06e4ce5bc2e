use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "keysync", version, about = "Secret-synchronization sidecar")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sidecar.
    Run(RunOpts),
    /// Inspect or manage configuration.
    Config(ConfigOpts),
    /// Print the version.
    Version,
}

#[derive(clap::Args)]
pub struct RunOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    /// Terminate once every declared resource reaches a terminal outcome.
    #[arg(long)]
    pub one_shot: bool,
    /// Override the telemetry port.
    #[arg(long)]
    pub metrics_port: Option<u16>,
    /// Override the output directory.
    #[arg(long)]
    pub output_dir: Option<String>,
    /// Fetcher command whose stdout carries the event stream; defaults to
    /// reading events from stdin.
    #[arg(long)]
    pub watcher_cmd: Option<String>,
    /// Override the per-subscriber delivery queue capacity.
    #[arg(long)]
    pub queue_capacity: Option<usize>,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}
