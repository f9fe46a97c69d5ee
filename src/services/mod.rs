//! Store and orchestration services.
//!
//! - `kv_store`: the persistence port and its SQLite / in-memory backends
//! - `move_service`: the `moves` slot
//! - `package_service`: one `packages-<moveId>` slot per store instance
//! - `inventory_service`: workflows spanning both (full delete, scans, stats)
//! - `suggestion_service`: packing suggestions from an external text model

pub mod inventory_service;
pub mod kv_store;
pub mod move_service;
pub mod package_service;
pub mod suggestion_service;

use std::time::Duration;
use uuid::Uuid;

/// Settings shared by every store instance.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Recorded as `userId` on audit entries and as the owner of new moves.
    pub user_id: String,

    /// Artificial delay applied before each store operation.
    pub latency: Duration,
}

impl StoreOptions {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_USER_ID)
    }
}

/// Fresh opaque identifier for moves, pickup locations and content items.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
