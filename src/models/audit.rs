//! Audit trail entries shared by moves and packages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One state-changing action recorded against a move or package.
///
/// Entries are appended in chronological order and never rewritten.
/// Consumers that want newest-first must sort a copy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// When the action happened.
    pub timestamp: DateTime<Utc>,

    /// Short action label, e.g. "Move Created".
    pub action: String,

    /// User who performed the action.
    pub user_id: String,

    /// Free-form context such as the fields touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditLogEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        action: &str,
        user_id: &str,
        details: Option<String>,
    ) -> Self {
        Self {
            timestamp,
            action: action.to_string(),
            user_id: user_id.to_string(),
            details,
        }
    }
}

/// Entities that carry an audit log and an `updated_at` stamp.
///
/// After creation `record` is the only way the stores touch either field, so every write
/// appends exactly one entry and bumps `updated_at` together.
pub trait Audited {
    fn audit_log_mut(&mut self) -> &mut Vec<AuditLogEntry>;

    fn updated_at(&self) -> DateTime<Utc>;

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    fn record(&mut self, action: &str, user_id: &str, details: Option<String>) {
        // Never let the stamp go backwards if the wall clock does.
        let now = Utc::now().max(self.updated_at());
        self.audit_log_mut()
            .push(AuditLogEntry::new(now, action, user_id, details));
        self.set_updated_at(now);
    }
}
