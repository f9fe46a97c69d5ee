//! Core data models for the move inventory.
//!
//! A `Move` is a relocation project; each `Package` belongs to exactly one
//! move through its `move_id`. Both carry an append-only audit trail and
//! serialize as camelCase JSON, the layout persisted in the key-value slots.

pub mod audit;
pub mod moves;
pub mod package;

pub use audit::{AuditLogEntry, Audited};
pub use moves::{
    Move, MoveUpdate, NewMove, NewPickupLocation, Permission, PickupLocation,
    PickupLocationUpdate, SharedUser,
};
pub use package::{
    Dimensions, LocationStatus, NewPackage, Package, PackageContentItem, PackageType,
    PackageUpdate, QR_CODE_PREFIX,
};
