//! src/services/move_service.rs
//!
//! MoveStore: CRUD over the `moves` slot. Every mutation is a single
//! read-modify-write of the whole list that also appends one audit entry
//! and refreshes `updatedAt`. Packages are not touched here; see
//! `InventoryService::delete_move` for the full delete path.

use crate::{
    errors::{StoreError, StoreResult},
    models::{
        AuditLogEntry, Audited, Move, MoveUpdate, NewMove, NewPickupLocation, Permission,
        PickupLocation, PickupLocationUpdate, SharedUser,
    },
    services::{
        StoreOptions,
        kv_store::{KvStore, read_list, write_list},
        new_id,
    },
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage slot holding every move.
pub const MOVES_KEY: &str = "moves";

#[derive(Clone)]
pub struct MoveStore<S: KvStore> {
    store: S,
    options: StoreOptions,
    /// Serializes read-modify-write cycles issued through this instance.
    write_lock: Arc<Mutex<()>>,
}

impl<S: KvStore> MoveStore<S> {
    pub fn new(store: S, options: StoreOptions) -> Self {
        Self {
            store,
            options,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// All moves in insertion order.
    pub async fn list(&self) -> StoreResult<Vec<Move>> {
        self.options.pause().await;
        read_list(&self.store, MOVES_KEY).await
    }

    /// Look up one move. Absence is not an error.
    pub async fn get(&self, id: &str) -> StoreResult<Option<Move>> {
        Ok(self.list().await?.into_iter().find(|m| m.id == id))
    }

    /// Create a move with a fresh id and a "Move Created" entry.
    ///
    /// No field validation happens here.
    pub async fn create(&self, fields: NewMove) -> StoreResult<Move> {
        let _guard = self.write_lock.lock().await;
        self.options.pause().await;

        let now = Utc::now();
        let user_id = self.options.user_id.clone();
        let created = Move {
            id: new_id(),
            user_id: user_id.clone(),
            name: fields.name,
            departure_address: fields.departure_address,
            arrival_address: fields.arrival_address,
            pickup_locations: Vec::new(),
            shared_with: Vec::new(),
            audit_log: vec![AuditLogEntry::new(now, "Move Created", &user_id, None)],
            created_at: now,
            updated_at: now,
        };

        let mut moves: Vec<Move> = read_list(&self.store, MOVES_KEY).await?;
        moves.push(created.clone());
        write_list(&self.store, MOVES_KEY, &moves).await?;

        info!(move_id = %created.id, "created move `{}`", created.name);
        Ok(created)
    }

    /// Merge `update` into the move and record which fields changed.
    pub async fn update(&self, id: &str, update: MoveUpdate) -> StoreResult<Move> {
        let details = format!("Fields updated: {}", update.field_names().join(", "));
        let user_id = self.options.user_id.clone();
        self.mutate(id, move |m| {
            update.apply_to(m);
            m.record("Move Updated", &user_id, Some(details));
            m.clone()
        })
        .await
    }

    /// Remove the move from the collection. Returns whether it existed.
    ///
    /// The move's `packages-<id>` slot is left as is.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        self.options.pause().await;

        let mut moves: Vec<Move> = read_list(&self.store, MOVES_KEY).await?;
        let before = moves.len();
        moves.retain(|m| m.id != id);
        let removed = moves.len() != before;
        if removed {
            write_list(&self.store, MOVES_KEY, &moves).await?;
            info!(move_id = %id, "deleted move");
        } else {
            debug!(move_id = %id, "delete skipped, move not found");
        }
        Ok(removed)
    }

    /// Append an audit entry. Misses and storage failures are logged and
    /// swallowed so callers can log without handling errors.
    pub async fn add_audit_entry(&self, id: &str, action: &str, details: Option<String>) {
        let user_id = self.options.user_id.clone();
        match self
            .mutate(id, |m| m.record(action, &user_id, details))
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound { .. }) => {
                debug!(move_id = %id, action, "audit entry dropped, move not found")
            }
            Err(err) => warn!(move_id = %id, action, "failed to append audit entry: {}", err),
        }
    }

    pub async fn add_pickup_location(
        &self,
        id: &str,
        fields: NewPickupLocation,
    ) -> StoreResult<PickupLocation> {
        let user_id = self.options.user_id.clone();
        self.mutate(id, move |m| {
            let location = PickupLocation {
                id: new_id(),
                address: fields.address,
                notes: fields.notes,
            };
            m.pickup_locations.push(location.clone());
            m.record(
                "Pickup Location Added",
                &user_id,
                Some(format!("Address: {}", location.address)),
            );
            location
        })
        .await
    }

    /// Patch a pickup location. An unknown `location_id` leaves the list
    /// unchanged but is still recorded against the move.
    pub async fn update_pickup_location(
        &self,
        id: &str,
        location_id: &str,
        update: PickupLocationUpdate,
    ) -> StoreResult<Move> {
        let user_id = self.options.user_id.clone();
        self.mutate(id, |m| {
            if let Some(loc) = m.pickup_locations.iter_mut().find(|l| l.id == location_id) {
                update.apply_to(loc);
            }
            m.record(
                "Pickup Location Updated",
                &user_id,
                Some(format!("Location ID: {}", location_id)),
            );
            m.clone()
        })
        .await
    }

    pub async fn delete_pickup_location(&self, id: &str, location_id: &str) -> StoreResult<Move> {
        let user_id = self.options.user_id.clone();
        self.mutate(id, |m| {
            m.pickup_locations.retain(|l| l.id != location_id);
            m.record(
                "Pickup Location Deleted",
                &user_id,
                Some(format!("Location ID: {}", location_id)),
            );
            m.clone()
        })
        .await
    }

    /// Grant `shared_user` access. Re-sharing replaces the permission.
    pub async fn share(
        &self,
        id: &str,
        shared_user: &str,
        permission: Permission,
    ) -> StoreResult<Move> {
        let user_id = self.options.user_id.clone();
        self.mutate(id, |m| {
            match m.shared_with.iter_mut().find(|s| s.user_id == shared_user) {
                Some(existing) => existing.permission = permission,
                None => m.shared_with.push(SharedUser {
                    user_id: shared_user.to_string(),
                    permission,
                }),
            }
            m.record(
                "Move Shared",
                &user_id,
                Some(format!(
                    "User: {}, Permission: {}",
                    shared_user,
                    permission.as_str()
                )),
            );
            m.clone()
        })
        .await
    }

    pub async fn unshare(&self, id: &str, shared_user: &str) -> StoreResult<Move> {
        let user_id = self.options.user_id.clone();
        self.mutate(id, |m| {
            m.shared_with.retain(|s| s.user_id != shared_user);
            m.record(
                "User Access Removed",
                &user_id,
                Some(format!("User: {}", shared_user)),
            );
            m.clone()
        })
        .await
    }

    /// Load, change one move in place, and persist.
    ///
    /// Nothing is written when `id` does not resolve.
    async fn mutate<R, F>(&self, id: &str, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Move) -> R,
    {
        let _guard = self.write_lock.lock().await;
        self.options.pause().await;

        let mut moves: Vec<Move> = read_list(&self.store, MOVES_KEY).await?;
        let target = moves
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::move_not_found(id))?;
        let out = f(target);
        write_list(&self.store, MOVES_KEY, &moves).await?;
        Ok(out)
    }
}
