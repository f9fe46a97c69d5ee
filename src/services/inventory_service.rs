//! src/services/inventory_service.rs
//!
//! InventoryService: workflows that span the move and package stores.
//!
//! The two stores never call each other. Anything that has to touch both
//! (deleting a move together with its packages, mirroring package changes
//! into the move's audit log, scanning across moves, dashboard figures)
//! lives here as explicit, separate steps.

use crate::{
    errors::{StoreError, StoreResult},
    models::{
        AuditLogEntry, LocationStatus, Move, NewPackage, Package, PackageType, PackageUpdate,
    },
    services::{
        StoreOptions,
        kv_store::{KvStore, read_list},
        move_service::MoveStore,
        package_service::{PACKAGES_KEY_PREFIX, PackageStore},
    },
    validation::calculate_volume,
};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex as StdMutex},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Entries shown in the dashboard activity feed.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Result of resolving a scanned QR payload.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", content = "value", rename_all = "camelCase")]
pub enum ScanOutcome {
    Found(Box<Package>),
    /// Our prefix, but no package with that id.
    UnknownPackage(String),
    /// Not a package payload at all.
    NotOurCode(String),
}

/// Search and filter options for one move's packages.
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    /// Case-insensitive; matches id, content type, room or any item name.
    pub term: Option<String>,
    pub package_type: Option<PackageType>,
    pub status: Option<LocationStatus>,
}

impl PackageFilter {
    pub fn matches(&self, pkg: &Package) -> bool {
        let term_ok = match self.term.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let needle = term.to_lowercase();
                pkg.id.to_lowercase().contains(&needle)
                    || pkg.content_type.to_lowercase().contains(&needle)
                    || pkg.room_of_origin.to_lowercase().contains(&needle)
                    || pkg
                        .contents
                        .iter()
                        .any(|item| item.name.to_lowercase().contains(&needle))
            }
        };
        let type_ok = self.package_type.is_none_or(|t| pkg.package_type == t);
        let status_ok = self.status.is_none_or(|s| pkg.location_status == s);
        term_ok && type_ok && status_ok
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoveSummary {
    pub move_id: String,
    pub package_count: usize,
    pub at_destination: usize,
    /// Share of packages at DESTINATION, rounded to a whole percent.
    pub progress_percent: u32,
    /// Cubic metres.
    pub total_volume: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_moves: usize,
    pub total_packages: usize,
    pub packages_by_type: BTreeMap<PackageType, usize>,
    pub progress_percent: u32,
    pub total_volume: f64,
    /// Newest first.
    pub recent_activity: Vec<AuditLogEntry>,
}

#[derive(Clone)]
pub struct InventoryService<S: KvStore> {
    store: S,
    options: StoreOptions,
    moves: MoveStore<S>,
    /// One write lock per move id, shared by every `PackageStore` handed out.
    package_locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl<S: KvStore> InventoryService<S> {
    pub fn new(store: S, options: StoreOptions) -> Self {
        Self {
            moves: MoveStore::new(store.clone(), options.clone()),
            store,
            options,
            package_locks: Arc::default(),
        }
    }

    pub fn moves(&self) -> &MoveStore<S> {
        &self.moves
    }

    /// A package store bound to `move_id`.
    ///
    /// Stores returned for the same move share a write lock, so concurrent
    /// creates through this service never hand out the same id.
    pub fn packages(&self, move_id: &str) -> PackageStore<S> {
        PackageStore::new(self.store.clone(), self.options.clone(), move_id)
            .with_write_lock(self.package_lock(move_id))
    }

    fn package_lock(&self, move_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .package_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(move_id.to_string()).or_default().clone()
    }

    async fn require_move(&self, move_id: &str) -> StoreResult<Move> {
        self.moves
            .get(move_id)
            .await?
            .ok_or_else(|| StoreError::move_not_found(move_id))
    }

    /// Create a package under an existing move and note it on the move.
    pub async fn create_package(&self, move_id: &str, fields: NewPackage) -> StoreResult<Package> {
        self.require_move(move_id).await?;
        let created = self.packages(move_id).create(move_id, fields).await?;
        self.moves
            .add_audit_entry(
                move_id,
                "Package Created",
                Some(format!("Package ID: {}", created.id)),
            )
            .await;
        Ok(created)
    }

    pub async fn update_package(
        &self,
        move_id: &str,
        package_id: &str,
        update: PackageUpdate,
    ) -> StoreResult<Package> {
        self.require_move(move_id).await?;
        let updated = self.packages(move_id).update(package_id, update).await?;
        self.moves
            .add_audit_entry(
                move_id,
                "Package Updated",
                Some(format!("Package ID: {}", package_id)),
            )
            .await;
        Ok(updated)
    }

    /// Delete a package; the move entry is only written when something was removed.
    pub async fn delete_package(&self, move_id: &str, package_id: &str) -> StoreResult<bool> {
        let removed = self.packages(move_id).delete(package_id).await?;
        if removed {
            self.moves
                .add_audit_entry(
                    move_id,
                    "Package Deleted",
                    Some(format!("Package ID: {}", package_id)),
                )
                .await;
        }
        Ok(removed)
    }

    /// Note that a label was produced for a package.
    pub async fn record_label_generated(&self, move_id: &str, package_id: &str) {
        self.moves
            .add_audit_entry(
                move_id,
                "Label Generated",
                Some(format!("Package ID: {}", package_id)),
            )
            .await;
    }

    /// The complete delete path: remove the move, then clear its package
    /// scope. Returns how many packages were removed.
    ///
    /// `MoveStore::delete` alone leaves the packages in place.
    pub async fn delete_move(&self, move_id: &str) -> StoreResult<usize> {
        if !self.moves.delete(move_id).await? {
            return Err(StoreError::move_not_found(move_id));
        }
        let cleared = self.packages(move_id).clear().await?;
        info!(move_id, cleared, "move deleted with its packages");
        Ok(cleared)
    }

    /// Every package in every move scope, ordered by slot key.
    ///
    /// Unreadable slots are skipped.
    pub async fn all_packages(&self) -> StoreResult<Vec<Package>> {
        let mut all = Vec::new();
        for key in self.store.keys_with_prefix(PACKAGES_KEY_PREFIX).await? {
            match read_list::<_, Package>(&self.store, &key).await {
                Ok(mut packages) => all.append(&mut packages),
                Err(err @ StoreError::Corrupt { .. }) => {
                    warn!("skipping package slot: {}", err)
                }
                Err(err) => return Err(err),
            }
        }
        Ok(all)
    }

    /// Resolve a scanned payload against every move.
    pub async fn find_by_qr(&self, payload: &str) -> StoreResult<ScanOutcome> {
        let Some(id) = Package::id_from_qr(payload) else {
            return Ok(ScanOutcome::NotOurCode(payload.to_string()));
        };
        let found = self.all_packages().await?.into_iter().find(|p| p.id == id);
        Ok(Self::outcome(id, found))
    }

    /// Resolve a scanned payload within one move.
    pub async fn scan_in_move(&self, move_id: &str, payload: &str) -> StoreResult<ScanOutcome> {
        let Some(id) = Package::id_from_qr(payload) else {
            return Ok(ScanOutcome::NotOurCode(payload.to_string()));
        };
        let found = self.packages(move_id).get(id).await?;
        Ok(Self::outcome(id, found))
    }

    fn outcome(id: &str, found: Option<Package>) -> ScanOutcome {
        match found {
            Some(pkg) => ScanOutcome::Found(Box::new(pkg)),
            None => ScanOutcome::UnknownPackage(id.to_string()),
        }
    }

    pub async fn search(&self, move_id: &str, filter: &PackageFilter) -> StoreResult<Vec<Package>> {
        Ok(self
            .packages(move_id)
            .list()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect())
    }

    pub async fn move_summary(&self, move_id: &str) -> StoreResult<MoveSummary> {
        self.require_move(move_id).await?;
        let packages = self.packages(move_id).list().await?;
        let at_destination = count_at_destination(&packages);
        Ok(MoveSummary {
            move_id: move_id.to_string(),
            package_count: packages.len(),
            at_destination,
            progress_percent: progress_percent(at_destination, packages.len()),
            total_volume: total_volume(&packages),
        })
    }

    pub async fn dashboard(&self) -> StoreResult<DashboardSummary> {
        let moves = self.moves.list().await?;
        let packages = self.all_packages().await?;

        let mut packages_by_type = BTreeMap::new();
        for pkg in &packages {
            *packages_by_type.entry(pkg.package_type).or_insert(0) += 1;
        }

        let mut recent_activity: Vec<AuditLogEntry> = moves
            .iter()
            .flat_map(|m| m.audit_log.iter().cloned())
            .chain(packages.iter().flat_map(|p| p.audit_log.iter().cloned()))
            .collect();
        // stable sort keeps insertion order among equal timestamps
        recent_activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

        let at_destination = count_at_destination(&packages);
        Ok(DashboardSummary {
            total_moves: moves.len(),
            total_packages: packages.len(),
            packages_by_type,
            progress_percent: progress_percent(at_destination, packages.len()),
            total_volume: total_volume(&packages),
            recent_activity,
        })
    }
}

fn count_at_destination(packages: &[Package]) -> usize {
    packages
        .iter()
        .filter(|p| p.location_status == LocationStatus::Destination)
        .count()
}

fn progress_percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round() as u32
}

fn total_volume(packages: &[Package]) -> f64 {
    packages.iter().map(|p| calculate_volume(&p.dimensions)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Dimensions, NewMove, PackageContentItem},
        services::{kv_store::MemoryKvStore, package_service::packages_key},
    };

    fn service() -> (MemoryKvStore, InventoryService<MemoryKvStore>) {
        let kv = MemoryKvStore::new();
        let svc = InventoryService::new(kv.clone(), StoreOptions::new("tester"));
        (kv, svc)
    }

    fn new_move(name: &str) -> NewMove {
        NewMove {
            name: name.into(),
            departure_address: "A".into(),
            arrival_address: "B".into(),
        }
    }

    fn new_package(package_type: PackageType, item: &str) -> NewPackage {
        NewPackage {
            package_type,
            content_type: "Misc".into(),
            room_of_origin: "Living Room".into(),
            dimensions: Dimensions {
                length: 100.0,
                width: 50.0,
                height: 20.0,
            },
            contents: vec![PackageContentItem {
                id: "c1".into(),
                name: item.into(),
                quantity: 1,
                photo: None,
            }],
            location_status: LocationStatus::Departure,
        }
    }

    #[tokio::test]
    async fn create_package_requires_move_and_logs_on_it() {
        let (_, svc) = service();
        let err = svc
            .create_package("ghost", new_package(PackageType::Box, "Lamp"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let m = svc.moves().create(new_move("Home")).await.unwrap();
        let pkg = svc
            .create_package(&m.id, new_package(PackageType::Box, "Lamp"))
            .await
            .unwrap();
        assert_eq!(pkg.id, "box1");

        let stored = svc.moves().get(&m.id).await.unwrap().unwrap();
        let last = stored.audit_log.last().unwrap();
        assert_eq!(last.action, "Package Created");
        assert_eq!(last.details.as_deref(), Some("Package ID: box1"));
    }

    #[tokio::test]
    async fn move_delete_alone_leaves_packages_but_full_delete_clears_them() {
        let (kv, svc) = service();
        let kept = svc.moves().create(new_move("Kept")).await.unwrap();
        let gone = svc.moves().create(new_move("Gone")).await.unwrap();
        for m in [&kept, &gone] {
            svc.create_package(&m.id, new_package(PackageType::Bag, "Towels"))
                .await
                .unwrap();
        }

        svc.moves().delete(&kept.id).await.unwrap();
        assert_eq!(svc.packages(&kept.id).list().await.unwrap().len(), 1);

        assert_eq!(svc.delete_move(&gone.id).await.unwrap(), 1);
        assert_eq!(kv.get(&packages_key(&gone.id)).await.unwrap(), None);
        assert!(svc.delete_move(&gone.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn scan_resolves_across_moves() {
        let (_, svc) = service();
        let a = svc.moves().create(new_move("A")).await.unwrap();
        let b = svc.moves().create(new_move("B")).await.unwrap();
        svc.create_package(&a.id, new_package(PackageType::Box, "Mugs"))
            .await
            .unwrap();
        svc.create_package(&b.id, new_package(PackageType::Trunk, "Coats"))
            .await
            .unwrap();

        match svc.find_by_qr("movemaestro://package/trunk1").await.unwrap() {
            ScanOutcome::Found(pkg) => assert_eq!(pkg.move_id, b.id),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            svc.find_by_qr("movemaestro://package/bulk7").await.unwrap(),
            ScanOutcome::UnknownPackage("bulk7".into())
        );
        assert_eq!(
            svc.find_by_qr("Movemaestro://package/box1").await.unwrap(),
            ScanOutcome::NotOurCode("Movemaestro://package/box1".into())
        );
        assert_eq!(
            svc.scan_in_move(&a.id, "movemaestro://package/trunk1")
                .await
                .unwrap(),
            ScanOutcome::UnknownPackage("trunk1".into())
        );
    }

    #[tokio::test]
    async fn search_matches_items_type_and_status() {
        let (_, svc) = service();
        let m = svc.moves().create(new_move("Home")).await.unwrap();
        svc.create_package(&m.id, new_package(PackageType::Box, "Coffee Grinder"))
            .await
            .unwrap();
        svc.create_package(&m.id, new_package(PackageType::Bag, "Pillows"))
            .await
            .unwrap();
        svc.update_package(
            &m.id,
            "bag1",
            PackageUpdate {
                location_status: Some(LocationStatus::Transit),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let by_item = svc
            .search(
                &m.id,
                &PackageFilter {
                    term: Some("grinder".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_item.len(), 1);
        assert_eq!(by_item[0].id, "box1");

        let in_transit = svc
            .search(
                &m.id,
                &PackageFilter {
                    status: Some(LocationStatus::Transit),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(in_transit.len(), 1);
        assert_eq!(in_transit[0].id, "bag1");

        let none = svc
            .search(
                &m.id,
                &PackageFilter {
                    term: Some("pillow".into()),
                    package_type: Some(PackageType::Box),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn summaries_report_progress_and_volume() {
        let (_, svc) = service();
        let m = svc.moves().create(new_move("Home")).await.unwrap();
        for _ in 0..3 {
            svc.create_package(&m.id, new_package(PackageType::Box, "Books"))
                .await
                .unwrap();
        }
        svc.update_package(
            &m.id,
            "box2",
            PackageUpdate {
                location_status: Some(LocationStatus::Destination),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let summary = svc.move_summary(&m.id).await.unwrap();
        assert_eq!(summary.package_count, 3);
        assert_eq!(summary.at_destination, 1);
        assert_eq!(summary.progress_percent, 33);
        assert!((summary.total_volume - 0.3).abs() < 1e-9);

        let dash = svc.dashboard().await.unwrap();
        assert_eq!(dash.total_moves, 1);
        assert_eq!(dash.total_packages, 3);
        assert_eq!(dash.packages_by_type.get(&PackageType::Box), Some(&3));
        // 5 entries on the move, 4 across its packages
        assert_eq!(dash.recent_activity.len(), 9);
        assert!(
            dash.recent_activity
                .windows(2)
                .all(|w| w[0].timestamp >= w[1].timestamp)
        );
    }

    #[tokio::test]
    async fn corrupt_package_slot_is_skipped() {
        let (kv, svc) = service();
        let m = svc.moves().create(new_move("Home")).await.unwrap();
        svc.create_package(&m.id, new_package(PackageType::Bulk, "Sofa"))
            .await
            .unwrap();
        kv.set("packages-broken", "not json".into()).await.unwrap();

        let all = svc.all_packages().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "bulk1");
    }
}
