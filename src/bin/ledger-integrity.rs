use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing::info;

use transparency_ledger::config::LedgerConfig;
use transparency_ledger::ledger::{ChainVerifier, IntegrityReportService};
use transparency_ledger::store::LedgerStore;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("ledger-integrity")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verify a transparency ledger's hash chain and print an integrity report")
        .arg(
            Arg::new("database-url")
                .short('d')
                .long("database-url")
                .value_name("URL")
                .help("Ledger database URL (defaults to LEDGER_DATABASE_URL)"),
        )
        .arg(
            Arg::new("refresh-cache")
                .long("refresh-cache")
                .action(ArgAction::SetTrue)
                .help("Update the advisory is_valid cache from this pass"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Emit the full report as JSON"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let quiet = matches.get_flag("quiet");

    let default_filter = if quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config = LedgerConfig::load().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let database_url = matches
        .get_one::<String>("database-url")
        .cloned()
        .unwrap_or(config.database_url);

    info!("Opening ledger at {}", database_url);
    let store = LedgerStore::connect(&database_url).await?;
    store.run_migrations().await?;

    let verifier = ChainVerifier::new(store);
    let result = if matches.get_flag("refresh-cache") {
        verifier.verify_and_refresh().await?
    } else {
        verifier.verify_chain().await?
    };

    let service = IntegrityReportService::new(verifier);
    let report = service.report_from(&result).await?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        println!("{}", report.summary());
        if let Some(latest) = &report.latest_entry {
            println!(
                "  latest entry: #{} at {} ({})",
                latest.sequence_number, latest.created_at, latest.entry_hash
            );
        }
    }

    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}
