//! Model types for the sync log and syncable entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// External system an entry is written back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSystem {
    Splynx,
    Erpnext,
}

impl TargetSystem {
    pub const ALL: [TargetSystem; 2] = [TargetSystem::Splynx, TargetSystem::Erpnext];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Splynx => "splynx",
            Self::Erpnext => "erpnext",
        }
    }

    /// Parse a stored or user-supplied target name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "splynx" => Some(Self::Splynx),
            "erpnext" => Some(Self::Erpnext),
            _ => None,
        }
    }

    /// Column holding the last committed content hash for this target.
    pub fn hash_column(&self) -> &'static str {
        match self {
            Self::Splynx => "splynx_sync_hash",
            Self::Erpnext => "erpnext_sync_hash",
        }
    }

    /// Column holding the last confirmed sync time for this target.
    pub fn synced_at_column(&self) -> &'static str {
        match self {
            Self::Splynx => "last_synced_to_splynx",
            Self::Erpnext => "last_synced_to_erpnext",
        }
    }
}

impl fmt::Display for TargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change written back to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            _ => Self::Pending,
        }
    }
}

/// Classification of the last failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network error, timeout, 5xx: retried with backoff.
    Transient,
    /// Rejected by the target (4xx validation): never retried automatically.
    Permanent,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transient" => Some(Self::Transient),
            "permanent" => Some(Self::Permanent),
            _ => None,
        }
    }
}

/// A row of `outbound_sync_log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub target_system: TargetSystem,
    pub operation: SyncOperation,
    pub idempotency_key: String,
    pub payload_hash: String,
    pub request_payload: Value,
    pub response_payload: Option<Value>,
    pub status: SyncStatus,
    pub external_id: Option<String>,
    pub error_message: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub claim_token: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub hash_committed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncLogEntry {
    /// Whether the entry will never be dispatched again automatically.
    ///
    /// `success` and `skipped` are absorbing; `failed` without a
    /// `next_retry_at` is terminal and waits for an operator.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            SyncStatus::Success | SyncStatus::Skipped => true,
            SyncStatus::Failed => self.next_retry_at.is_none(),
            SyncStatus::Pending => false,
        }
    }

    /// Hash the entity carries for this target once the entry succeeded.
    ///
    /// A delivered delete leaves no content at the target, so it clears the
    /// hash and a later restore is sent as a create.
    pub fn committed_hash(&self) -> Option<&str> {
        match self.operation {
            SyncOperation::Delete => None,
            SyncOperation::Create | SyncOperation::Update => Some(&self.payload_hash),
        }
    }

    /// Whether the entry should be shown to an operator.
    pub fn needs_attention(&self) -> bool {
        (self.status == SyncStatus::Failed && self.next_retry_at.is_none())
            || (self.status == SyncStatus::Success && !self.hash_committed)
    }
}

/// Values for inserting a new log entry.
#[derive(Debug, Clone)]
pub struct NewSyncLogEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub target_system: TargetSystem,
    pub operation: SyncOperation,
    pub idempotency_key: String,
    pub payload_hash: String,
    pub request_payload: Value,
}

/// Outcome of a failed attempt, written by the dispatcher.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub error_message: String,
    pub error_kind: FailureKind,
    pub retry_count: u32,
    /// `None` makes the failure terminal.
    pub next_retry_at: Option<DateTime<Utc>>,
    pub response_payload: Option<Value>,
}

/// Outcome of an accepted delivery, written by the dispatcher.
#[derive(Debug, Clone)]
pub struct SuccessRecord {
    pub external_id: Option<String>,
    pub response_payload: Value,
}

/// Per-target sync bookkeeping stored on a syncable row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySyncState {
    pub sync_hash: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A syncable domain row (unified contact, invoice, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncableEntity {
    pub entity_type: String,
    pub entity_id: String,
    pub data: Value,
    pub sync_state: HashMap<TargetSystem, EntitySyncState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SyncableEntity {
    /// Stored content hash for a target, if the entity was ever synced there.
    pub fn sync_hash(&self, target: TargetSystem) -> Option<&str> {
        self.sync_state
            .get(&target)
            .and_then(|state| state.sync_hash.as_deref())
    }

    pub fn last_synced_at(&self, target: TargetSystem) -> Option<DateTime<Utc>> {
        self.sync_state
            .get(&target)
            .and_then(|state| state.last_synced_at)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Serialized form sent to targets.
    ///
    /// Soft-deleted rows are wrapped so that deleting an entity changes its
    /// content hash even when `data` is untouched.
    pub fn outbound_payload(&self) -> Value {
        match self.deleted_at {
            Some(deleted_at) => serde_json::json!({
                "deleted_at": deleted_at.to_rfc3339(),
                "data": self.data,
            }),
            None => self.data.clone(),
        }
    }
}

/// Entity types with a syncable table, and the table backing each.
pub const SYNCABLE_TABLES: [(&str, &str); 2] =
    [("contact", "unified_contacts"), ("invoice", "invoices")];

/// Resolve the table backing an entity type.
pub fn syncable_table(entity_type: &str) -> Option<&'static str> {
    SYNCABLE_TABLES
        .iter()
        .find(|(kind, _)| *kind == entity_type)
        .map(|(_, table)| *table)
}

/// Number of log rows per (target, status).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub target_system: TargetSystem,
    pub status: SyncStatus,
    pub count: i64,
}
