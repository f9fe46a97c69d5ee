//! Represents a move, a relocation project that owns packages by reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::{AuditLogEntry, Audited};

/// A single relocation project.
///
/// Packages are not embedded here; they live in a separate per-move slot and
/// point back through `Package::move_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// Opaque identifier assigned at creation.
    pub id: String,

    /// Owner of the move.
    pub user_id: String,

    /// Display name, e.g. "Apartment Move".
    pub name: String,

    pub departure_address: String,

    pub arrival_address: String,

    /// Intermediate pickup stops, in the order they were added.
    #[serde(default)]
    pub pickup_locations: Vec<PickupLocation>,

    /// Users this move is shared with, unique by `user_id`.
    #[serde(default)]
    pub shared_with: Vec<SharedUser>,

    /// Append-only history of changes, oldest first.
    #[serde(default)]
    pub audit_log: Vec<AuditLogEntry>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Audited for Move {
    fn audit_log_mut(&mut self) -> &mut Vec<AuditLogEntry> {
        &mut self.audit_log
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// A pickup stop attached to a move.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PickupLocation {
    pub id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Access level granted to another user.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            other => Err(format!("unknown permission `{}`", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharedUser {
    pub user_id: String,
    pub permission: Permission,
}

/// Caller-supplied fields for a new move.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewMove {
    pub name: String,
    pub departure_address: String,
    pub arrival_address: String,
}

/// Partial update for a move. `None` leaves the field untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MoveUpdate {
    pub name: Option<String>,
    pub departure_address: Option<String>,
    pub arrival_address: Option<String>,
    pub pickup_locations: Option<Vec<PickupLocation>>,
    pub shared_with: Option<Vec<SharedUser>>,
}

impl MoveUpdate {
    /// Serialized names of the fields this update sets.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.name.is_some() {
            names.push("name");
        }
        if self.departure_address.is_some() {
            names.push("departureAddress");
        }
        if self.arrival_address.is_some() {
            names.push("arrivalAddress");
        }
        if self.pickup_locations.is_some() {
            names.push("pickupLocations");
        }
        if self.shared_with.is_some() {
            names.push("sharedWith");
        }
        names
    }

    /// Merge the present fields into `target`.
    pub fn apply_to(self, target: &mut Move) {
        if let Some(name) = self.name {
            target.name = name;
        }
        if let Some(addr) = self.departure_address {
            target.departure_address = addr;
        }
        if let Some(addr) = self.arrival_address {
            target.arrival_address = addr;
        }
        if let Some(locations) = self.pickup_locations {
            target.pickup_locations = locations;
        }
        if let Some(shared) = self.shared_with {
            target.shared_with = dedup_shared(shared);
        }
    }
}

/// Keep the last permission given to each user, in first-seen order.
fn dedup_shared(entries: Vec<SharedUser>) -> Vec<SharedUser> {
    let mut out: Vec<SharedUser> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out.iter_mut().find(|e| e.user_id == entry.user_id) {
            Some(existing) => existing.permission = entry.permission,
            None => out.push(entry),
        }
    }
    out
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewPickupLocation {
    pub address: String,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PickupLocationUpdate {
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl PickupLocationUpdate {
    pub fn apply_to(&self, target: &mut PickupLocation) {
        if let Some(address) = &self.address {
            target.address = address.clone();
        }
        if let Some(notes) = &self.notes {
            target.notes = Some(notes.clone());
        }
    }
}
