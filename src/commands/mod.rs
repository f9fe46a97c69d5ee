//! Command-line surface.
//!
//! ## Structure
//! - `moves`     list, show, create, update, delete, share, unshare
//! - `pickups`   add, update, delete pickup locations of a move
//! - `packages`  list, show, add, update, delete, next-id, search, summary, label
//! - `scan`      resolve a QR payload across every move
//! - `dashboard` totals, progress and recent activity
//!
//! Every handler returns a JSON value; `main` prints it.

pub mod move_commands;
pub mod package_commands;
pub mod report_commands;

use crate::{
    models::{LocationStatus, PackageType, Permission},
    services::{inventory_service::InventoryService, kv_store::KvStore},
};
use anyhow::Result;
use clap::{Args as ClapArgs, Subcommand};
use serde_json::Value;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage moves
    Moves {
        #[command(subcommand)]
        action: MoveAction,
    },
    /// Manage a move's pickup locations
    Pickups {
        #[command(subcommand)]
        action: PickupAction,
    },
    /// Manage the packages of a move
    Packages {
        #[command(subcommand)]
        action: PackageAction,
    },
    /// Look up a package from a scanned QR payload
    Scan { payload: String },
    /// Totals, progress and recent activity across all moves
    Dashboard,
}

#[derive(Subcommand, Debug)]
pub enum MoveAction {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "from")]
        departure_address: String,
        #[arg(long = "to")]
        arrival_address: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "from")]
        departure_address: Option<String>,
        #[arg(long = "to")]
        arrival_address: Option<String>,
    },
    /// Delete a move and, unless --keep-packages, its packages
    Delete {
        id: String,
        #[arg(long)]
        keep_packages: bool,
    },
    Share {
        id: String,
        user: String,
        #[arg(long, default_value = "read")]
        permission: Permission,
    },
    Unshare {
        id: String,
        user: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PickupAction {
    Add {
        move_id: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Update {
        move_id: String,
        location_id: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete {
        move_id: String,
        location_id: String,
    },
}

/// Package fields shared by `add` and `update`.
#[derive(ClapArgs, Debug, Default)]
pub struct PackageFields {
    #[arg(long = "type")]
    pub package_type: Option<PackageType>,
    #[arg(long)]
    pub content_type: Option<String>,
    #[arg(long)]
    pub room: Option<String>,
    /// Centimetres
    #[arg(long)]
    pub length: Option<f64>,
    #[arg(long)]
    pub width: Option<f64>,
    #[arg(long)]
    pub height: Option<f64>,
    /// Content item as `name` or `name:quantity`; repeatable
    #[arg(long = "item")]
    pub items: Vec<String>,
    /// Path to an image attached to the last --item
    #[arg(long)]
    pub photo: Option<std::path::PathBuf>,
    #[arg(long)]
    pub status: Option<LocationStatus>,
}

#[derive(Subcommand, Debug)]
pub enum PackageAction {
    List {
        move_id: String,
    },
    Show {
        move_id: String,
        package_id: String,
    },
    Add {
        move_id: String,
        #[command(flatten)]
        fields: PackageFields,
    },
    Update {
        move_id: String,
        package_id: String,
        #[command(flatten)]
        fields: PackageFields,
    },
    Delete {
        move_id: String,
        package_id: String,
    },
    /// Preview the id the next package of a type would get
    NextId {
        move_id: String,
        #[arg(long = "type")]
        package_type: PackageType,
    },
    Search {
        move_id: String,
        #[arg(long)]
        term: Option<String>,
        #[arg(long = "type")]
        package_type: Option<PackageType>,
        #[arg(long)]
        status: Option<LocationStatus>,
    },
    Summary {
        move_id: String,
    },
    /// Print the QR payload for a label and record it on the move
    Label {
        move_id: String,
        package_id: String,
    },
}

/// Dispatch one parsed command.
pub async fn run<S: KvStore>(service: &InventoryService<S>, command: Command) -> Result<Value> {
    match command {
        Command::Moves { action } => move_commands::run(service, action).await,
        Command::Pickups { action } => move_commands::run_pickup(service, action).await,
        Command::Packages { action } => package_commands::run(service, action).await,
        Command::Scan { payload } => report_commands::scan(service, &payload).await,
        Command::Dashboard => report_commands::dashboard(service).await,
    }
}
