//! # mesa
//!
//! Command-line front end for the reservation engine. Every command prints
//! JSON on stdout; failures print an `ApiError` on stderr and exit 1.
//! `mesa --help` lists the commands.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use mesa_db::Database;
use mesa_reservations::{init_tracing, ApiError, ApiResult, BookingService, EngineConfig};

use crate::cli::{list_filter, Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let body = serde_json::to_string(&err).unwrap_or_else(|_| err.to_string());
            eprintln!("{}", body);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ApiResult<String> {
    debug!(command = ?cli.command, "Parsed command");

    let config = EngineConfig::load(cli.config)?;
    let db_config = config.db_config();
    if let Some(parent) = db_config
        .database_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| ApiError::internal(format!("Cannot create {}: {}", parent.display(), e)))?;
    }

    let db = Database::new(db_config).await?;
    let service = BookingService::from_config(db.clone(), &config)?;
    info!("Reservation engine ready");

    let output = execute(&service, cli.command).await;
    db.close().await;
    output
}

async fn execute(service: &BookingService, command: Command) -> ApiResult<String> {
    match command {
        Command::Slots {
            date,
            party,
            location,
        } => to_json(&service.slots_for_date(date, party, location).await?),
        Command::Check {
            date,
            time,
            party,
            location,
        } => {
            let available = service.check(date, time, party, location).await?;
            to_json(&serde_json::json!({ "disponible": available }))
        }
        Command::Book(args) => to_json(&service.create(args.into()).await?),
        Command::Get { code } => to_json(&service.get(&code).await?),
        Command::Update { code, changes } => {
            to_json(&service.update(&code, changes.into()).await?)
        }
        Command::Cancel { code, reason } => {
            to_json(&service.cancel(&code, reason.as_deref()).await?)
        }
        Command::List {
            date,
            search,
            page,
            per_page,
        } => to_json(&service.list(list_filter(date, search, page, per_page)).await?),
        Command::Stats { date } => to_json(&service.day_stats(date).await?),
        Command::Verify { date } => {
            let conflicts = service.verify(date).await?;
            to_json(&serde_json::json!({
                "date": date,
                "consistent": conflicts.is_empty(),
                "conflicts": conflicts,
            }))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> ApiResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| ApiError::internal(e.to_string()))
}
