use clap::Parser;
use keysync::cli::{Cli, Commands};
use keysync::config::Config;
use keysync::logging;
use keysync::runtime::Sidecar;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(opts) => {
            info!("starting the keysync sidecar");
            let config = Config::load(opts.config.as_deref())?;
            let sidecar = Sidecar::start(config, &opts)?;
            let code = sidecar.run_until_shutdown().await?;
            std::process::exit(code);
        }
        Commands::Config(opts) => {
            match opts.action {
                keysync::cli::ConfigAction::Show => {
                    let config = Config::load(opts.config.as_deref())?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                keysync::cli::ConfigAction::Validate => {
                    let config = Config::load(opts.config.as_deref())?;
                    keysync::config::validate(&config)?;
                    info!("configuration is valid");
                }
                keysync::cli::ConfigAction::Init => {
                    keysync::config::write_default(
                        opts.config.as_deref().unwrap_or(keysync::config::DEFAULT_CONFIG_FILE),
                    )?;
                    info!("configuration file created");
                }
            }
        }
        Commands::Version => {
            println!("keysync {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
