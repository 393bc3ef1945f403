use clap::Parser;
use owo_colors::{OwoColorize, Style};
use routine_core::error::{CoreError, ReplicationError};

mod cli;
mod commands;
mod config;
mod logging;
mod parser;
mod timezone;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    logging::setup_logging(cli.verbose);

    let config = match config::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{} Failed to load configuration: {}",
                "Error:".red().bold(),
                e
            );
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        cli::Commands::Generate(command) => {
            commands::generate::generate_workbook(command, &config).await
        }
        cli::Commands::Preview(command) => {
            commands::preview::preview_occurrences(command, &config)
        }
        cli::Commands::Backup(command) => commands::backup::backup_now(command, &config).await,
        cli::Commands::Watch(command) => commands::watch::watch_backups(command, &config).await,
        cli::Commands::Presets => commands::presets::list_presets(),
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::Configuration(e) => {
                eprintln!("{} Invalid rule model: {}", "Error:".style(error_style), e);
                eprintln!("No workbook was written. Fix the configuration and run again.");
            }
            CoreError::Replication(ReplicationError::Aborted { committed, error }) => {
                eprintln!(
                    "{} Generation aborted after {} occurrences",
                    "Error:".style(error_style),
                    committed
                );
                eprintln!(
                    "  View {} rejected {} on {}: {}",
                    error.view.yellow(),
                    error.description.yellow(),
                    error.date,
                    error.reason
                );
                eprintln!("No workbook was written.");
            }
            CoreError::Replication(ReplicationError::Diverged { view, position }) => {
                eprintln!(
                    "{} View {} diverges from the master view at row {}",
                    "Error:".style(error_style),
                    view.yellow(),
                    position
                );
            }
            CoreError::Backup(e) => {
                eprintln!("{} Backup failed: {}", "Error:".style(error_style), e);
            }
            CoreError::InvalidTimezone(s) => {
                eprintln!("{} Invalid timezone: {}", "Error:".style(error_style), s);
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
