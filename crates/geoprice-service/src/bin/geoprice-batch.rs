//! # Batch Job Runner
//!
//! Command-line entry point for the price conversion batch job.
//!
//! ## Usage
//! ```bash
//! # Convert every product now, in this process
//! cargo run -p geoprice-service --bin geoprice-batch -- run
//!
//! # Schedule a run for a worker to pick up
//! cargo run -p geoprice-service --bin geoprice-batch -- schedule
//!
//! # Start a worker, drain the scheduled run and exit
//! cargo run -p geoprice-service --bin geoprice-batch -- worker
//!
//! # Show progress (add --json for machine output)
//! cargo run -p geoprice-service --bin geoprice-batch -- status --json
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use geoprice_db::Database;
use geoprice_service::{
    AdminPricing, BatchRunner, BatchStatus, BatchWorker, GeoPriceConfig, PricingContext,
};

/// How often `worker` checks whether the run has drained.
const DRAIN_POLL: Duration = Duration::from_millis(500);

fn print_help() {
    println!("GeoPrice Batch Runner");
    println!();
    println!("Usage: geoprice-batch <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run                Convert all products now");
    println!("  schedule           Schedule a run for a worker");
    println!("  worker             Run the worker until the scheduled run finishes");
    println!("  status             Show batch progress");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Config file (default: platform config dir)");
    println!("      --json           Print status as JSON");
    println!("  -h, --help           Show this help message");
}

fn print_status(status: &BatchStatus) {
    println!("Scheduled:  {}", if status.scheduled { "yes" } else { "no" });
    if let Some(run_id) = status.run_id {
        println!("Run ID:     {}", run_id);
    }
    match status.completed_at {
        Some(at) => println!("Last run:   {}", at.to_rfc3339()),
        None => println!("Last run:   never"),
    }
    println!(
        "Products:   {} of {} converted",
        status.ready_products, status.total_products
    );
}

/// Sets up logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=geoprice_db=debug` - Show every meta write
/// - Default: INFO level, sqlx at WARN
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut command: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other if command.is_none() && !other.starts_with('-') => {
                command = Some(other.to_string());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let Some(command) = command else {
        print_help();
        std::process::exit(2);
    };

    let config = match GeoPriceConfig::load(config_path) {
        Ok(config) => config,
        Err(e) if e.is_config_error() => {
            eprintln!("✗ {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };
    let db = Database::new(config.db_config()).await?;
    let ctx = PricingContext::from_config(db, &config)?;
    let runner = BatchRunner::new(ctx, config.batch.clone());

    match command.as_str() {
        "run" => {
            let summary = runner.run_full_pass().await?;
            println!(
                "✓ Converted {} products in {} pages ({} fields written, {} skipped)",
                summary.products, summary.pages, summary.written, summary.skipped
            );
        }
        "schedule" => {
            let admin = AdminPricing::new(runner);
            match admin.schedule_batch().await? {
                Some(run_id) => println!("✓ Scheduled run {}", run_id),
                None => println!("⚠ A run is already scheduled"),
            }
        }
        "worker" => {
            let (worker, handle) = BatchWorker::new(runner.clone(), config.batch.poll_interval());
            let task = tokio::spawn(worker.run());

            let admin = AdminPricing::new(runner).with_worker(handle.clone());
            if admin.schedule_batch().await?.is_none() {
                println!("Resuming the run already scheduled");
            }

            while admin.batch_status().await?.scheduled {
                tokio::time::sleep(DRAIN_POLL).await;
            }

            handle.shutdown().await?;
            task.await?;
            print_status(&admin.batch_status().await?);
        }
        "status" => {
            let status = AdminPricing::new(runner).batch_status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(2);
        }
    }

    Ok(())
}
