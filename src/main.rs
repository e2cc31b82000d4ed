//! Operator tool for the translation database.
//!
//! Usage:
//!   translation-store migrate             # Create tables and indexes
//!   translation-store populate [COUNT]    # Seed synthetic translations (default 100000)
//!   translation-store export <LOCALE>     # Print key -> content JSON for a locale
//!   translation-store locales             # List locales in use
//!   translation-store tags                # List tag names
//!   translation-store stats <LOCALE>      # Count and last update for a locale
//!
//! Required environment variables:
//! - DATABASE_URL
//!
//! Optional:
//! - POPULATE_SEED (fixed seed for reproducible population)

use anyhow::{Context, Result};
use std::time::Instant;
use tracing::info;
use translation_store::{Config, PgBackend, TranslationService};

const DEFAULT_POPULATE_COUNT: u64 = 100_000;

fn print_usage() {
    eprintln!(
        "Usage: translation-store <command>\n\n\
         Commands:\n  \
         migrate             Create tables and indexes\n  \
         populate [COUNT]    Seed synthetic translations (default {})\n  \
         export <LOCALE>     Print key -> content JSON for a locale\n  \
         locales             List locales in use\n  \
         tags                List tag names\n  \
         stats <LOCALE>      Count and last update for a locale",
        DEFAULT_POPULATE_COUNT
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_store=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    if matches!(command.as_str(), "--help" | "-h" | "help") {
        print_usage();
        return Ok(());
    }

    let config = Config::from_env()?;

    match command.as_str() {
        "migrate" => {
            let backend = PgBackend::connect(&config).await?;
            backend.migrate().await
        }
        "populate" => {
            let count = match args.get(2) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("Invalid record count: {}", raw))?,
                None => DEFAULT_POPULATE_COUNT,
            };
            let service = TranslationService::connect(&config).await?;

            let started = Instant::now();
            let created = service.populate_synthetic(count).await?;
            info!(
                "Successfully created {} translations in {} ms",
                created,
                started.elapsed().as_millis()
            );
            Ok(())
        }
        "export" => {
            let locale = args.get(2).context("export requires a locale")?;
            let service = TranslationService::connect(&config).await?;
            let map = service.export_locale(locale).await?;
            println!("{}", serde_json::to_string_pretty(&*map)?);
            Ok(())
        }
        "locales" => {
            let service = TranslationService::connect(&config).await?;
            for locale in service.list_locales().await? {
                println!("{}", locale);
            }
            Ok(())
        }
        "tags" => {
            let service = TranslationService::connect(&config).await?;
            for tag in service.list_tags().await? {
                println!("{}", tag);
            }
            Ok(())
        }
        "stats" => {
            let locale = args.get(2).context("stats requires a locale")?;
            let service = TranslationService::connect(&config).await?;
            let stats = service.locale_stats(locale).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}
