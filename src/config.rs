use crate::{commands::Command, services::StoreOptions};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, time::Duration};

/// Acting user when none is configured.
pub const DEFAULT_USER_ID: &str = "mock-user-123";

const DEFAULT_DATABASE_URL: &str = "sqlite://./data/move_maestro.db";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub user_id: String,
    pub latency_ms: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Track packages across household moves")]
pub struct Args {
    /// Database URL (overrides MOVE_MAESTRO_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// User recorded on audit entries (overrides MOVE_MAESTRO_USER_ID)
    #[arg(long, global = true)]
    pub user_id: Option<String>,

    /// Artificial delay per store operation in ms (overrides MOVE_MAESTRO_LATENCY_MS)
    #[arg(long, global = true)]
    pub latency_ms: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the
    /// remaining invocation.
    pub fn from_env_and_args() -> Result<(Self, Args)> {
        let args = Args::parse();
        let cfg = Self::resolve(&args, |key| env::var(key))?;
        Ok((cfg, args))
    }

    /// Merge `args` over values read through `lookup`, then defaults.
    pub fn resolve<F>(args: &Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_db = lookup("MOVE_MAESTRO_DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
        let env_user = lookup("MOVE_MAESTRO_USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.into());
        let env_latency = match lookup("MOVE_MAESTRO_LATENCY_MS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing MOVE_MAESTRO_LATENCY_MS value `{}`", value))?,
            Err(env::VarError::NotPresent) => 0,
            Err(err) => return Err(err).context("reading MOVE_MAESTRO_LATENCY_MS"),
        };

        Ok(Self {
            database_url: args.database_url.clone().unwrap_or(env_db),
            user_id: args.user_id.clone().unwrap_or(env_user),
            latency_ms: args.latency_ms.unwrap_or(env_latency),
        })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::new(self.user_id.clone()).with_latency(Duration::from_millis(self.latency_ms))
    }
}
