mod cli;
mod runner;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use runner::{ExchangeRunner, cycle_options};
use sweeper_core::config::types::AppConfig;
use sweeper_core::logger::init_logger;
use sweeper_core::types::Exchange;

#[derive(Parser)]
#[command(author, version, about = "Zombie order and position sweeper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep every configured exchange until Ctrl-C (default)
    Run {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        aggressive: bool,
    },
    /// Run a single cycle and print the reports as JSON
    Once {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        aggressive: bool,
        /// Only this exchange, e.g. `bybit`
        #[arg(long)]
        exchange: Option<Exchange>,
    },
    /// Check configuration health
    Doctor {
        /// Also ping each enabled exchange
        #[arg(long)]
        ping: bool,
    },
}

fn load_config() -> AppConfig {
    AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Run `sweeper doctor` to check your configuration.");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _logguard = init_logger()?;

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run {
        dry_run: false,
        aggressive: false,
    }) {
        Commands::Doctor { ping } => cli::doctor::run_doctor(ping).await,
        Commands::Once {
            dry_run,
            aggressive,
            exchange,
        } => {
            let app_config = load_config();
            let exchanges = match exchange {
                Some(e) => vec![e],
                None => app_config.enabled_exchanges(),
            };
            let options = cycle_options(&app_config, dry_run, aggressive);
            let reports = ExchangeRunner::from_app_config(&app_config, &exchanges, options)?
                .run_once()
                .await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
        Commands::Run {
            dry_run,
            aggressive,
        } => {
            let app_config = load_config();
            tracing::info!(
                mode = ?app_config.execution_mode,
                exchanges = ?app_config.runner.exchanges,
                "Starting sweeper"
            );
            let options = cycle_options(&app_config, dry_run, aggressive);
            ExchangeRunner::from_app_config(&app_config, &app_config.enabled_exchanges(), options)?
                .run()
                .await
                .map_err(anyhow::Error::from)
        }
    }
}
