use anyhow::{Context, Result};
use move_maestro::{
    commands,
    config::AppConfig,
    services::{inventory_service::InventoryService, kv_store::SqliteKvStore},
};
use std::{fs, path::Path};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr, so stdout stays pure JSON) ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, args) = AppConfig::from_env_and_args()?;
    tracing::debug!("Starting move-maestro with config: {:?}", cfg);

    // --- Initialize SQLite ---
    ensure_database_dir(&cfg.database_url)?;
    let store = SqliteKvStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening database {}", cfg.database_url))?;
    let statements = store.migrate().await.context("running migrations")?;

    // --- Handle migration mode ---
    if args.migrate {
        tracing::info!("Database migration complete ({} statements).", statements);
        return Ok(());
    }

    let Some(command) = args.command else {
        anyhow::bail!("no command given, see --help");
    };

    let service = InventoryService::new(store, cfg.store_options());
    let output = commands::run(&service, command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Create the parent directory of a file-backed SQLite URL.
fn ensure_database_dir(database_url: &str) -> Result<()> {
    if database_url.contains(":memory:") {
        return Ok(());
    }

    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}
