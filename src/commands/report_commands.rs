//! Handlers for `scan` and `dashboard`.

use crate::services::{
    inventory_service::{InventoryService, ScanOutcome},
    kv_store::KvStore,
};
use anyhow::Result;
use serde_json::Value;
use tracing::info;

pub async fn scan<S: KvStore>(service: &InventoryService<S>, payload: &str) -> Result<Value> {
    let outcome = service.find_by_qr(payload).await?;
    match &outcome {
        ScanOutcome::Found(pkg) => info!(package_id = %pkg.id, move_id = %pkg.move_id, "package found"),
        ScanOutcome::UnknownPackage(id) => info!(package_id = %id, "package not found in any move"),
        ScanOutcome::NotOurCode(raw) => info!("scanned `{}` is not a package code", raw),
    }
    Ok(serde_json::to_value(outcome)?)
}

pub async fn dashboard<S: KvStore>(service: &InventoryService<S>) -> Result<Value> {
    Ok(serde_json::to_value(service.dashboard().await?)?)
}
