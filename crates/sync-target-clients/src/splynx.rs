//! Splynx REST API client.

use crate::http::{self, IDEMPOTENCY_HEADER};
use crate::{DeliveryError, DeliveryReceipt, DeliveryRequest, SyncTarget, TargetResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use sync_config_and_utils::TargetSettings;
use sync_database::{SyncOperation, TargetSystem};
use tracing::debug;
use url::Url;

const CUSTOMERS: &[&str] = &["customers", "customer"];
const INVOICES: &[&str] = &["finance", "invoices"];

/// Writes contacts and invoices back to Splynx.
///
/// Authenticates with HTTP Basic (API key / secret). Created records come
/// back with a numeric `id`, which becomes the external id.
pub struct SplynxTarget {
    client: Client,
    base_url: Url,
    api_key: String,
    api_secret: String,
}

impl SplynxTarget {
    pub fn new(settings: &TargetSettings, timeout: Duration) -> TargetResult<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: settings.url()?,
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
        })
    }

    fn resource(entity_type: &str) -> Option<&'static [&'static str]> {
        match entity_type {
            "contact" => Some(CUSTOMERS),
            "invoice" => Some(INVOICES),
            _ => None,
        }
    }

    fn url_for(&self, request: &DeliveryRequest) -> Result<Url, DeliveryError> {
        let resource = Self::resource(&request.entity_type).ok_or_else(|| {
            DeliveryError::permanent(format!(
                "Splynx has no resource for entity type {}",
                request.entity_type
            ))
        })?;

        let mut segments = vec!["api", "2.0", "admin"];
        segments.extend_from_slice(resource);
        if request.operation != SyncOperation::Create {
            segments.push(request.require_external_id()?);
        }
        http::resource_url(&self.base_url, &segments)
    }
}

#[async_trait]
impl SyncTarget for SplynxTarget {
    fn system(&self) -> TargetSystem {
        TargetSystem::Splynx
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt, DeliveryError> {
        let url = self.url_for(request)?;
        debug!(
            url = %url,
            operation = %request.operation,
            idempotency_key = %request.idempotency_key,
            "Sending to Splynx"
        );

        let mut builder = self
            .client
            .request(http::method_for(request.operation), url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key);
        if request.operation != SyncOperation::Delete {
            builder = builder.json(&request.payload);
        }

        let response = http::send(builder).await?;
        let external_id = match request.operation {
            SyncOperation::Create => http::id_field(&response, "id"),
            _ => request.external_id.clone(),
        };

        Ok(DeliveryReceipt {
            external_id,
            response,
        })
    }
}
