//! src/services/package_service.rs
//!
//! PackageStore: CRUD over one move's `packages-<moveId>` slot. A store is
//! bound to a single move for its lifetime; every lookup matches on both the
//! package id and that move id.
//!
//! Package ids are ordinal: `<type><n>` where `n` is one more than the
//! number of packages of that type already in the move (`box1`, `box2`,
//! `trunk1`, ...). The id is chosen inside the same locked read-modify-write
//! as the insert, so two creates through one store never collide.

use crate::{
    errors::{StoreError, StoreResult},
    models::{AuditLogEntry, Audited, NewPackage, Package, PackageType, PackageUpdate},
    services::{
        StoreOptions,
        kv_store::{KvStore, read_list, write_list},
    },
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Prefix of every per-move package slot.
pub const PACKAGES_KEY_PREFIX: &str = "packages-";

/// Slot name for a move's packages.
pub fn packages_key(move_id: &str) -> String {
    format!("{}{}", PACKAGES_KEY_PREFIX, move_id)
}

#[derive(Clone)]
pub struct PackageStore<S: KvStore> {
    store: S,
    options: StoreOptions,
    move_id: String,
    key: String,
    write_lock: Arc<Mutex<()>>,
}

impl<S: KvStore> PackageStore<S> {
    /// Bind a store to `move_id`. Stores for different moves share nothing.
    pub fn new(store: S, options: StoreOptions, move_id: impl Into<String>) -> Self {
        let move_id = move_id.into();
        Self {
            key: packages_key(&move_id),
            store,
            options,
            move_id,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Use `lock` for writes instead of this store's own, so every store
    /// handed the same lock serializes against the others.
    pub fn with_write_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.write_lock = lock;
        self
    }

    pub fn move_id(&self) -> &str {
        &self.move_id
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Packages of the bound move in insertion order.
    pub async fn list(&self) -> StoreResult<Vec<Package>> {
        self.options.pause().await;
        self.load().await
    }

    pub async fn get(&self, package_id: &str) -> StoreResult<Option<Package>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|p| p.id == package_id && p.move_id == self.move_id))
    }

    /// Preview the id the next package of `package_type` would receive.
    ///
    /// Nothing is reserved: two calls without a create in between return
    /// the same id.
    pub async fn next_id(&self, package_type: PackageType) -> StoreResult<String> {
        let packages = self.list().await?;
        Ok(next_ordinal_id(&packages, &self.move_id, package_type))
    }

    /// Create a package in the bound move.
    ///
    /// `move_id` is the move the caller intends; a mismatch with the bound
    /// scope is rejected before anything is read or written.
    pub async fn create(&self, move_id: &str, fields: NewPackage) -> StoreResult<Package> {
        if move_id != self.move_id {
            return Err(StoreError::ScopeMismatch {
                bound: self.move_id.clone(),
                requested: move_id.to_string(),
            });
        }

        let _guard = self.write_lock.lock().await;
        self.options.pause().await;

        let mut packages = self.load().await?;
        let id = next_ordinal_id(&packages, &self.move_id, fields.package_type);
        let now = Utc::now();
        let created = Package {
            qr_code_value: Package::qr_value_for(&id),
            id,
            move_id: self.move_id.clone(),
            package_type: fields.package_type,
            content_type: fields.content_type,
            room_of_origin: fields.room_of_origin,
            dimensions: fields.dimensions,
            contents: fields.contents,
            location_status: fields.location_status,
            audit_log: vec![AuditLogEntry::new(
                now,
                "Package Created",
                &self.options.user_id,
                None,
            )],
            created_at: now,
            updated_at: now,
        };

        packages.push(created.clone());
        write_list(&self.store, &self.key, &packages).await?;

        info!(move_id = %self.move_id, package_id = %created.id, "created package");
        Ok(created)
    }

    /// Merge `update` into a package of the bound move.
    ///
    /// `id` and `qr_code_value` stay as assigned even when the type changes.
    pub async fn update(&self, package_id: &str, update: PackageUpdate) -> StoreResult<Package> {
        let details = format!("Fields updated: {}", update.field_names().join(", "));
        let user_id = self.options.user_id.clone();
        self.mutate(package_id, move |p| {
            update.apply_to(p);
            p.record("Package Updated", &user_id, Some(details));
            p.clone()
        })
        .await
    }

    /// Remove a package of the bound move. Anything else is a no-op.
    pub async fn delete(&self, package_id: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        self.options.pause().await;

        let mut packages = self.load().await?;
        let before = packages.len();
        packages.retain(|p| p.id != package_id || p.move_id != self.move_id);
        let removed = packages.len() != before;
        if removed {
            write_list(&self.store, &self.key, &packages).await?;
            info!(move_id = %self.move_id, package_id, "deleted package");
        } else {
            debug!(move_id = %self.move_id, package_id, "delete skipped, package not found");
        }
        Ok(removed)
    }

    /// Append an audit entry; misses and storage failures are only logged.
    pub async fn add_audit_entry(&self, package_id: &str, action: &str, details: Option<String>) {
        let user_id = self.options.user_id.clone();
        match self
            .mutate(package_id, |p| p.record(action, &user_id, details))
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound { .. }) | Err(StoreError::ScopeMismatch { .. }) => {
                debug!(move_id = %self.move_id, package_id, action, "audit entry dropped")
            }
            Err(err) => warn!(
                move_id = %self.move_id,
                package_id,
                action,
                "failed to append audit entry: {}",
                err
            ),
        }
    }

    /// Drop the whole slot. Returns how many packages it held.
    pub async fn clear(&self) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        self.options.pause().await;

        let count = match self.load().await {
            Ok(packages) => packages.len(),
            Err(StoreError::Corrupt { .. }) => 0,
            Err(err) => return Err(err),
        };
        if self.store.remove(&self.key).await? {
            info!(move_id = %self.move_id, count, "cleared package scope");
        }
        Ok(count)
    }

    async fn load(&self) -> StoreResult<Vec<Package>> {
        read_list(&self.store, &self.key).await
    }

    async fn mutate<R, F>(&self, package_id: &str, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Package) -> R,
    {
        let _guard = self.write_lock.lock().await;
        self.options.pause().await;

        let mut packages = self.load().await?;
        let Some(idx) = packages
            .iter()
            .position(|p| p.id == package_id && p.move_id == self.move_id)
        else {
            return Err(match packages.iter().find(|p| p.id == package_id) {
                Some(foreign) => StoreError::ScopeMismatch {
                    bound: self.move_id.clone(),
                    requested: foreign.move_id.clone(),
                },
                None => StoreError::package_not_found(package_id),
            });
        };
        let out = f(&mut packages[idx]);
        write_list(&self.store, &self.key, &packages).await?;
        Ok(out)
    }
}

/// `<type><count + 1>`, advanced past any ordinal already taken.
///
/// Only collides with the plain count after a deletion (`box1` deleted,
/// `box2` still present).
fn next_ordinal_id(packages: &[Package], move_id: &str, package_type: PackageType) -> String {
    let stem = package_type.id_stem();
    let count = packages
        .iter()
        .filter(|p| p.package_type == package_type && p.move_id == move_id)
        .count();
    let mut ordinal = count + 1;
    loop {
        let candidate = format!("{}{}", stem, ordinal);
        if !packages
            .iter()
            .any(|p| p.id == candidate && p.move_id == move_id)
        {
            return candidate;
        }
        ordinal += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Dimensions, LocationStatus, PackageContentItem},
        services::kv_store::MemoryKvStore,
    };
    use std::time::Duration;

    fn new_package(package_type: PackageType) -> NewPackage {
        NewPackage {
            package_type,
            content_type: "Kitchenware".into(),
            room_of_origin: "Kitchen".into(),
            dimensions: Dimensions {
                length: 50.0,
                width: 40.0,
                height: 30.0,
            },
            contents: vec![PackageContentItem {
                id: "item-1".into(),
                name: "Plates".into(),
                quantity: 6,
                photo: None,
            }],
            location_status: LocationStatus::Departure,
        }
    }

    fn store_for(kv: &MemoryKvStore, move_id: &str) -> PackageStore<MemoryKvStore> {
        PackageStore::new(kv.clone(), StoreOptions::new("tester"), move_id)
    }

    #[tokio::test]
    async fn ordinal_ids_count_per_type() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");

        let b1 = packages.create("m1", new_package(PackageType::Box)).await.unwrap();
        let t1 = packages.create("m1", new_package(PackageType::Trunk)).await.unwrap();
        let b2 = packages.create("m1", new_package(PackageType::Box)).await.unwrap();

        assert_eq!(b1.id, "box1");
        assert_eq!(t1.id, "trunk1");
        assert_eq!(b2.id, "box2");
        assert_eq!(b2.qr_code_value, "movemaestro://package/box2");
        assert_eq!(b2.audit_log.len(), 1);
        assert_eq!(b2.audit_log[0].action, "Package Created");
        assert_eq!(b2.created_at, b2.updated_at);
        assert_eq!(b2.audit_log[0].timestamp, b2.created_at);
    }

    #[tokio::test]
    async fn next_id_is_a_preview_until_create() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");

        let first = packages.next_id(PackageType::Bag).await.unwrap();
        let again = packages.next_id(PackageType::Bag).await.unwrap();
        assert_eq!(first, "bag1");
        assert_eq!(first, again);

        packages.create("m1", new_package(PackageType::Bag)).await.unwrap();
        assert_eq!(packages.next_id(PackageType::Bag).await.unwrap(), "bag2");
        assert_eq!(packages.next_id(PackageType::Bulk).await.unwrap(), "bulk1");
    }

    #[tokio::test]
    async fn ordinal_skips_ids_freed_by_deletion() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");
        packages.create("m1", new_package(PackageType::Box)).await.unwrap();
        packages.create("m1", new_package(PackageType::Box)).await.unwrap();
        assert!(packages.delete("box1").await.unwrap());

        // one box left, so the count alone would hand out box2 again
        let next = packages.create("m1", new_package(PackageType::Box)).await.unwrap();
        assert_eq!(next.id, "box3");
    }

    #[tokio::test]
    async fn create_for_another_move_is_scope_mismatch() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");
        let err = packages
            .create("m2", new_package(PackageType::Box))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ScopeMismatch { ref bound, ref requested } if bound == "m1" && requested == "m2"
        ));
        assert!(packages.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stores_for_different_moves_are_independent() {
        let kv = MemoryKvStore::new();
        let a = store_for(&kv, "m1");
        let b = store_for(&kv, "m2");
        a.create("m1", new_package(PackageType::Box)).await.unwrap();
        let other = b.create("m2", new_package(PackageType::Box)).await.unwrap();

        assert_eq!(other.id, "box1");
        assert_eq!(a.list().await.unwrap().len(), 1);
        assert_eq!(b.list().await.unwrap().len(), 1);
        assert_eq!(b.get("box1").await.unwrap().unwrap().move_id, "m2");
    }

    #[tokio::test]
    async fn update_keeps_qr_value_and_logs_fields() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");
        let created = packages.create("m1", new_package(PackageType::Box)).await.unwrap();

        let updated = packages
            .update(
                "box1",
                PackageUpdate {
                    package_type: Some(PackageType::Trunk),
                    location_status: Some(LocationStatus::Destination),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, "box1");
        assert_eq!(updated.package_type, PackageType::Trunk);
        assert_eq!(updated.qr_code_value, Package::qr_value_for(&updated.id));
        assert_eq!(updated.audit_log.len(), 2);
        assert_eq!(
            updated.audit_log[1].details.as_deref(),
            Some("Fields updated: type, locationStatus")
        );
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn status_can_move_backwards() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");
        packages.create("m1", new_package(PackageType::Bag)).await.unwrap();
        for status in [
            LocationStatus::Destination,
            LocationStatus::Departure,
            LocationStatus::Transit,
        ] {
            let p = packages
                .update(
                    "bag1",
                    PackageUpdate {
                        location_status: Some(status),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(p.location_status, status);
        }
    }

    #[tokio::test]
    async fn update_missing_package_is_not_found() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");
        let err = packages
            .update("box9", PackageUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn foreign_package_in_slot_is_scope_mismatch() {
        let kv = MemoryKvStore::new();
        let stray = store_for(&kv, "m2")
            .create("m2", new_package(PackageType::Box))
            .await
            .unwrap();
        // a record that somehow landed in m1's slot
        write_list(&kv, &packages_key("m1"), &[stray]).await.unwrap();

        let packages = store_for(&kv, "m1");
        let err = packages
            .update("box1", PackageUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ScopeMismatch { .. }));
        assert_eq!(packages.get("box1").await.unwrap(), None);
        assert!(!packages.delete("box1").await.unwrap());
        assert_eq!(packages.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_ids_do_not_push_the_ordinal() {
        let kv = MemoryKvStore::new();
        let stray = store_for(&kv, "m2")
            .create("m2", new_package(PackageType::Box))
            .await
            .unwrap();
        write_list(&kv, &packages_key("m1"), &[stray]).await.unwrap();

        let packages = store_for(&kv, "m1");
        assert_eq!(packages.next_id(PackageType::Box).await.unwrap(), "box1");
        let created = packages.create("m1", new_package(PackageType::Box)).await.unwrap();
        assert_eq!(created.id, "box1");
        assert_eq!(packages.get("box1").await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn stores_sharing_a_lock_do_not_collide() {
        let kv = MemoryKvStore::new();
        let lock = Arc::new(Mutex::new(()));
        let slow = StoreOptions::new("tester").with_latency(Duration::from_millis(5));
        let a = PackageStore::new(kv.clone(), slow.clone(), "m1").with_write_lock(lock.clone());
        let b = PackageStore::new(kv.clone(), slow, "m1").with_write_lock(lock);

        let (first, second) = tokio::join!(
            a.create("m1", new_package(PackageType::Box)),
            b.create("m1", new_package(PackageType::Box)),
        );
        let mut ids = vec![first.unwrap().id, second.unwrap().id];
        ids.sort();
        assert_eq!(ids, vec!["box1", "box2"]);
        assert_eq!(a.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn audit_entry_is_fire_and_forget() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");
        packages.create("m1", new_package(PackageType::Bulk)).await.unwrap();

        packages.add_audit_entry("ghost", "Label Generated", None).await;
        packages
            .add_audit_entry("bulk1", "Label Generated", Some("printed".into()))
            .await;

        let p = packages.get("bulk1").await.unwrap().unwrap();
        assert_eq!(p.audit_log.len(), 2);
        assert_eq!(p.audit_log[1].action, "Label Generated");
    }

    #[tokio::test]
    async fn clear_removes_slot() {
        let kv = MemoryKvStore::new();
        let packages = store_for(&kv, "m1");
        packages.create("m1", new_package(PackageType::Box)).await.unwrap();
        packages.create("m1", new_package(PackageType::Box)).await.unwrap();

        assert_eq!(packages.clear().await.unwrap(), 2);
        assert_eq!(kv.get(&packages_key("m1")).await.unwrap(), None);
        assert_eq!(packages.clear().await.unwrap(), 0);
    }
}
