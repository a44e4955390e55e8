//! The delivery interface shared by all target systems.

use crate::DeliveryError;
use async_trait::async_trait;
use serde_json::Value;
use sync_database::{SyncLogEntry, SyncOperation, TargetSystem};

/// One outbound call, built from a sync log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub entity_type: String,
    pub entity_id: String,
    pub operation: SyncOperation,
    pub idempotency_key: String,
    pub payload: Value,
    /// Identifier the target assigned on an earlier create, needed for
    /// update and delete.
    pub external_id: Option<String>,
}

impl DeliveryRequest {
    pub fn from_entry(entry: &SyncLogEntry, external_id: Option<String>) -> Self {
        Self {
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            operation: entry.operation,
            idempotency_key: entry.idempotency_key.clone(),
            payload: entry.request_payload.clone(),
            external_id,
        }
    }

    /// External id, or a permanent error for operations that need one.
    pub(crate) fn require_external_id(&self) -> Result<&str, DeliveryError> {
        self.external_id.as_deref().ok_or_else(|| {
            DeliveryError::permanent(format!(
                "{} {} has no external id for {}",
                self.entity_type, self.entity_id, self.operation
            ))
        })
    }
}

/// Accepted delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    /// Identifier assigned (create) or confirmed (update/delete) by the target.
    pub external_id: Option<String>,
    /// Response body, stored on the log entry for audit.
    pub response: Value,
}

/// A system of record that accepts write-backs.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Which system this client talks to.
    fn system(&self) -> TargetSystem;

    /// Deliver one change. Must send `request.idempotency_key` so the target
    /// can drop replays of an attempt whose response was lost.
    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt, DeliveryError>;
}
