//! ERPNext (Frappe) REST API client.

use crate::http::{self, IDEMPOTENCY_HEADER};
use crate::{DeliveryError, DeliveryReceipt, DeliveryRequest, SyncTarget, TargetResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use sync_config_and_utils::TargetSettings;
use sync_database::{SyncOperation, TargetSystem};
use tracing::debug;
use url::Url;

/// Writes contacts and invoices back to ERPNext through `/api/resource`.
///
/// Frappe wraps created documents as `{"data": {...}}`; the document
/// `name` is the external id.
pub struct ErpnextTarget {
    client: Client,
    base_url: Url,
    token: String,
}

impl ErpnextTarget {
    pub fn new(settings: &TargetSettings, timeout: Duration) -> TargetResult<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: settings.url()?,
            token: format!("token {}:{}", settings.api_key, settings.api_secret),
        })
    }

    fn doctype(entity_type: &str) -> Option<&'static str> {
        match entity_type {
            "contact" => Some("Contact"),
            "invoice" => Some("Sales Invoice"),
            _ => None,
        }
    }
}

#[async_trait]
impl SyncTarget for ErpnextTarget {
    fn system(&self) -> TargetSystem {
        TargetSystem::Erpnext
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt, DeliveryError> {
        let doctype = Self::doctype(&request.entity_type).ok_or_else(|| {
            DeliveryError::permanent(format!(
                "ERPNext has no doctype for entity type {}",
                request.entity_type
            ))
        })?;

        let url = match request.operation {
            SyncOperation::Create => {
                http::resource_url(&self.base_url, &["api", "resource", doctype])?
            }
            SyncOperation::Update | SyncOperation::Delete => {
                let name = request.require_external_id()?;
                http::resource_url(&self.base_url, &["api", "resource", doctype, name])?
            }
        };

        debug!(
            url = %url,
            operation = %request.operation,
            idempotency_key = %request.idempotency_key,
            "Sending to ERPNext"
        );

        let mut builder = self
            .client
            .request(http::method_for(request.operation), url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key);
        if request.operation != SyncOperation::Delete {
            builder = builder.json(&request.payload);
        }

        let response = http::send(builder).await?;
        let external_id = match request.operation {
            SyncOperation::Create => response
                .get("data")
                .and_then(|doc| http::id_field(doc, "name")),
            _ => request.external_id.clone(),
        };

        Ok(DeliveryReceipt {
            external_id,
            response,
        })
    }
}
