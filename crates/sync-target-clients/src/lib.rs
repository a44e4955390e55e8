//! Delivery clients for the external systems of record.
//!
//! Each target system is reached through a [`SyncTarget`]; the dispatcher
//! looks targets up by [`TargetSystem`](sync_database::TargetSystem) in a
//! [`TargetRegistry`].

mod erpnext;
mod error;
mod http;
mod recording;
mod registry;
mod splynx;
mod target;

pub use erpnext::ErpnextTarget;
pub use error::{DeliveryError, TargetError, TargetResult};
pub use recording::RecordingTarget;
pub use registry::TargetRegistry;
pub use splynx::SplynxTarget;
pub use target::{DeliveryReceipt, DeliveryRequest, SyncTarget};
