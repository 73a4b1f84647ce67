//! Entry point: CLI parsing, tracing setup, config load, and dispatch to
//! either the tailing supervisor or the front-contract marker pass. A
//! thin `main.rs` that parses a derive-based CLI, installs a
//! `tracing-subscriber` fmt layer, and maps errors to process exit codes
//! via `exitcode`.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use scid_tailer::config::Config;
use scid_tailer::{front_contract, schema, supervisor};

#[derive(Parser)]
#[command(name = "scid-tailer", about = "Tails SCID market data files into a time-series database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the tailing supervisor loop until interrupted or a tick fails.
    Tail,
    /// Run the front-contract marker pass over a date range. `--start-date`
    /// defaults to the earliest record in the table, `--end-date` defaults
    /// to today, and `--symbols` defaults to every distinct symbol present.
    MarkFrontContract {
        #[arg(long)]
        start_date: Option<chrono::NaiveDate>,
        #[arg(long)]
        end_date: Option<chrono::NaiveDate>,
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,
        #[arg(long)]
        resume_from_symbol: Option<String>,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(message = "configuration error", %error);
            return ExitCode::from(exitcode::CONFIG as u8);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.postgres_url())
        .await
    {
        Ok(pool) => pool,
        Err(error) => {
            tracing::error!(message = "failed to connect to database", %error);
            return ExitCode::from(exitcode::UNAVAILABLE as u8);
        }
    };

    match cli.command {
        Command::Tail => {
            if supervisor::run(&config, &pool).await {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(exitcode::SOFTWARE as u8)
            }
        }
        Command::MarkFrontContract {
            start_date,
            end_date,
            symbols,
            resume_from_symbol,
        } => {
            if let Err(error) = schema::bootstrap(&pool, &config.table_name).await {
                tracing::error!(message = "schema bootstrap failed", %error);
                return ExitCode::from(exitcode::SOFTWARE as u8);
            }

            let symbols = match symbols {
                Some(symbols) => symbols,
                None => match front_contract::discover_symbols(&pool, &config.table_name).await {
                    Ok(symbols) => {
                        tracing::info!(message = "discovered symbols", ?symbols);
                        symbols
                    }
                    Err(error) => {
                        tracing::error!(message = "failed to discover symbols", %error);
                        return ExitCode::from(exitcode::SOFTWARE as u8);
                    }
                },
            };

            if symbols.is_empty() {
                tracing::info!("no symbols found, nothing to mark");
                return ExitCode::SUCCESS;
            }

            let start_date = match start_date {
                Some(start_date) => start_date,
                None => match front_contract::discover_start_date(&pool, &config.table_name).await {
                    Ok(start_date) => start_date,
                    Err(error) => {
                        tracing::error!(message = "failed to discover start date", %error);
                        return ExitCode::from(exitcode::SOFTWARE as u8);
                    }
                },
            };
            let end_date = end_date.unwrap_or_else(|| chrono::Utc::now().date_naive());

            let failures = front_contract::run_marker(
                &pool,
                &config.table_name,
                start_date,
                end_date,
                &symbols,
                resume_from_symbol.as_deref(),
            )
            .await;

            if failures == 0 {
                ExitCode::SUCCESS
            } else {
                tracing::error!(message = "front-contract marker pass completed with failures", failures);
                ExitCode::from(exitcode::SOFTWARE as u8)
            }
        }
    }
}
