//! HTTP plumbing shared by the target clients.

use crate::DeliveryError;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use sync_database::SyncOperation;
use tracing::debug;
use url::Url;

/// Header carrying the log entry's idempotency key on every request.
pub(crate) const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    let builder = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("outsync/", env!("CARGO_PKG_VERSION")));
    // Tests talk to loopback servers only
    #[cfg(test)]
    let builder = builder.no_proxy();
    builder.build()
}

pub(crate) fn method_for(operation: SyncOperation) -> Method {
    match operation {
        SyncOperation::Create => Method::POST,
        SyncOperation::Update => Method::PUT,
        SyncOperation::Delete => Method::DELETE,
    }
}

/// Append percent-encoded path segments to `base`.
pub(crate) fn resource_url(base: &Url, segments: &[&str]) -> Result<Url, DeliveryError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| DeliveryError::permanent(format!("{} cannot be a base URL", base)))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

/// Send a request and classify the answer.
///
/// The body is returned as JSON; a non-JSON body is wrapped as
/// `{"raw": "<text>"}` so it can still be stored for audit.
pub(crate) async fn send(request: RequestBuilder) -> Result<Value, DeliveryError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }))
    };

    debug!(status = status.as_u16(), "Target responded");

    if status.is_success() {
        Ok(body)
    } else {
        Err(DeliveryError::from_status(status.as_u16(), body))
    }
}

/// Read an identifier that may be encoded as a string or a number.
pub(crate) fn id_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
