//! In-process target for tests and dry runs.

use crate::{DeliveryError, DeliveryReceipt, DeliveryRequest, SyncTarget};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sync_database::TargetSystem;

/// A target that records every request and answers from a script.
///
/// Scripted outcomes are consumed in order; once the script is empty every
/// delivery succeeds with an external id of `ext-<entity_id>`.
pub struct RecordingTarget {
    system: TargetSystem,
    script: Mutex<VecDeque<Result<DeliveryReceipt, DeliveryError>>>,
    requests: Mutex<Vec<DeliveryRequest>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTarget {
    pub fn new(system: TargetSystem) -> Self {
        Self {
            system,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            latency: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue the outcome of the next unscripted delivery.
    pub fn push_outcome(&self, outcome: Result<DeliveryReceipt, DeliveryError>) {
        self.script.lock().push_back(outcome);
    }

    /// Make every delivery take `latency` (to exercise timeouts and permits).
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Highest number of deliveries observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncTarget for RecordingTarget {
    fn system(&self) -> TargetSystem {
        self.system
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt, DeliveryError> {
        self.requests.lock().push(request.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(DeliveryReceipt {
                external_id: Some(
                    request
                        .external_id
                        .clone()
                        .unwrap_or_else(|| format!("ext-{}", request.entity_id)),
                ),
                response: serde_json::json!({ "ok": true }),
            })
        })
    }
}
