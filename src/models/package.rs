//! Represents a package (box, trunk, bag, bulk item) tracked within a move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::audit::{AuditLogEntry, Audited};

/// Prefix of every package QR payload. The package id follows directly.
pub const QR_CODE_PREFIX: &str = "movemaestro://package/";

/// Kind of physical container.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageType {
    Box,
    Trunk,
    Bag,
    Bulk,
}

impl PackageType {
    pub const ALL: [PackageType; 4] = [
        PackageType::Box,
        PackageType::Trunk,
        PackageType::Bag,
        PackageType::Bulk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Box => "BOX",
            PackageType::Trunk => "TRUNK",
            PackageType::Bag => "BAG",
            PackageType::Bulk => "BULK",
        }
    }

    /// Lowercase stem used for ordinal ids (`box`, `trunk`, ...).
    pub fn id_stem(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown package type `{}`", s))
    }
}

/// Where a package currently is. Transitions are not restricted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocationStatus {
    #[default]
    Departure,
    Transit,
    Destination,
}

impl LocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationStatus::Departure => "DEPARTURE",
            LocationStatus::Transit => "TRANSIT",
            LocationStatus::Destination => "DESTINATION",
        }
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            LocationStatus::Departure,
            LocationStatus::Transit,
            LocationStatus::Destination,
        ]
        .into_iter()
        .find(|st| st.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown location status `{}`", s))
    }
}

/// Outer dimensions in centimetres.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// One line of a package's contents list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageContentItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    /// Inline image as a `data:image/...;base64,` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// A physical container within one move.
///
/// `id` is the ordinal id (`box2`) and never changes after creation, even if
/// `package_type` is later edited. `qr_code_value` is always
/// `QR_CODE_PREFIX + id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,

    /// Owning move.
    pub move_id: String,

    #[serde(rename = "type")]
    pub package_type: PackageType,

    pub content_type: String,

    pub room_of_origin: String,

    pub dimensions: Dimensions,

    #[serde(default)]
    pub contents: Vec<PackageContentItem>,

    pub location_status: LocationStatus,

    pub qr_code_value: String,

    #[serde(default)]
    pub audit_log: Vec<AuditLogEntry>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// QR payload for a package id.
    pub fn qr_value_for(id: &str) -> String {
        format!("{}{}", QR_CODE_PREFIX, id)
    }

    /// Recover a package id from a scanned payload.
    ///
    /// The prefix match is case-sensitive; anything else is not one of ours.
    pub fn id_from_qr(payload: &str) -> Option<&str> {
        payload
            .strip_prefix(QR_CODE_PREFIX)
            .filter(|id| !id.is_empty())
    }
}

impl Audited for Package {
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

/// Caller-supplied fields for a new package. Identity, QR value, timestamps
/// and audit log are assigned by the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPackage {
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub content_type: String,
    pub room_of_origin: String,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub contents: Vec<PackageContentItem>,
    #[serde(default)]
    pub location_status: LocationStatus,
}

/// Partial update for a package. Identity fields are not updatable.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageUpdate {
    #[serde(rename = "type")]
    pub package_type: Option<PackageType>,
    pub content_type: Option<String>,
    pub room_of_origin: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub contents: Option<Vec<PackageContentItem>>,
    pub location_status: Option<LocationStatus>,
}

impl PackageUpdate {
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.package_type.is_some() {
            names.push("type");
        }
        if self.content_type.is_some() {
            names.push("contentType");
        }
        if self.room_of_origin.is_some() {
            names.push("roomOfOrigin");
        }
        if self.dimensions.is_some() {
            names.push("dimensions");
        }
        if self.contents.is_some() {
            names.push("contents");
        }
        if self.location_status.is_some() {
            names.push("locationStatus");
        }
        names
    }

    /// Merge into `target`. `id` and `qr_code_value` are left alone.
    pub fn apply_to(self, target: &mut Package) {
        if let Some(t) = self.package_type {
            target.package_type = t;
        }
        if let Some(v) = self.content_type {
            target.content_type = v;
        }
        if let Some(v) = self.room_of_origin {
            target.room_of_origin = v;
        }
        if let Some(v) = self.dimensions {
            target.dimensions = v;
        }
        if let Some(v) = self.contents {
            target.contents = v;
        }
        if let Some(v) = self.location_status {
            target.location_status = v;
        }
    }
}
