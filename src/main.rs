mod cli;
mod logging;
mod reporter;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use dotenv::dotenv;
use photo_sync::auth;
use photo_sync::uploader::GooglePhotosUploader;
use photo_sync::{AppConfig, DryRunUploader, Ledger, RunOutcome, UploadEngine};
use reporter::CliReporter;
use tracing::{error, info};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let limit = match args.upload_limit() {
        Ok(limit) => limit,
        Err(err) => {
            error!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let config = match photo_sync::config::load_configuration() {
        Ok(config) => config.with_overrides(args.path.clone(), limit),
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command.unwrap_or(Commands::Upload) {
        Commands::Upload => run_upload(&config, args.dry_run),
        Commands::CountLedger => count_ledger(&config),
        Commands::PrintConfig => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        Commands::ResetLedger => reset_ledger(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_upload(config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let engine = UploadEngine::new(config.clone());
    let reporter = CliReporter::new();

    let result = if dry_run {
        let mut uploader = DryRunUploader::new();
        engine.run(&mut uploader, &reporter)
    } else {
        let transport = auth::authenticated_transport(config)
            .context("Unable to obtain an authenticated client")?;
        let mut uploader = GooglePhotosUploader::new(transport, config.api_base_url.as_str());
        engine.run(&mut uploader, &reporter)
    }
    .context("Upload run stopped")?;

    match result.outcome {
        RunOutcome::CapReached => info!("Limit reached after {} uploads", result.uploaded),
        RunOutcome::Completed => info!("All files processed, {} uploaded", result.uploaded),
    }
    Ok(())
}

fn count_ledger(config: &AppConfig) -> anyhow::Result<()> {
    info!("Counting upload ledger entries...");
    let ledger = Ledger::load(&config.ledger_path)
        .with_context(|| format!("Unable to read ledger {}", config.ledger_path.display()))?;
    info!("Total entries in upload ledger: {}", ledger.len());
    Ok(())
}

fn reset_ledger(config: &AppConfig) -> anyhow::Result<()> {
    let confirmed = prompt_confirm(
        "Are you SURE you want to forget EVERY recorded upload?",
        Some(false),
    )?;
    if !confirmed {
        return Ok(());
    }
    let mut ledger = Ledger::load(&config.ledger_path)?;
    ledger.reset()?;
    println!("Ledger cleared");
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
