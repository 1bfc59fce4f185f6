//! autotest CLI entry point.

use clap::Parser;

use autotest::cli::{commands, handle_error, Cli, Commands};
use autotest::infrastructure::config::ConfigLoader;
use autotest::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let config = match ConfigLoader::load_with(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, json_mode),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, config, json_mode).await,
        Commands::Plan(args) => commands::plan::execute(args, config, json_mode).await,
        Commands::Inspect(args) => commands::inspect::execute(args, json_mode).await,
        Commands::Config => commands::config::execute(config, json_mode),
    };

    if let Err(err) = result {
        handle_error(err, json_mode);
    }
}
