//! Lookup of delivery clients by target system.

use crate::{ErpnextTarget, SplynxTarget, SyncTarget, TargetResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sync_config_and_utils::Config;
use sync_database::TargetSystem;
use tracing::info;

/// Registered targets, one per system.
#[derive(Clone, Default)]
pub struct TargetRegistry {
    targets: HashMap<TargetSystem, Arc<dyn SyncTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP clients for every target configured in `config`.
    pub fn from_config(config: &Config, timeout: Duration) -> TargetResult<Self> {
        let mut registry = Self::new();
        if let Some(settings) = &config.splynx {
            registry.register(Arc::new(SplynxTarget::new(settings, timeout)?));
        }
        if let Some(settings) = &config.erpnext {
            registry.register(Arc::new(ErpnextTarget::new(settings, timeout)?));
        }
        info!(targets = ?registry.systems(), "Target registry built");
        Ok(registry)
    }

    /// Register a target, replacing any previous one for the same system.
    pub fn register(&mut self, target: Arc<dyn SyncTarget>) {
        self.targets.insert(target.system(), target);
    }

    pub fn get(&self, system: TargetSystem) -> Option<Arc<dyn SyncTarget>> {
        self.targets.get(&system).cloned()
    }

    /// Registered systems in a stable order.
    pub fn systems(&self) -> Vec<TargetSystem> {
        TargetSystem::ALL
            .into_iter()
            .filter(|system| self.targets.contains_key(system))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeliveryError, DeliveryReceipt, DeliveryRequest};
    use async_trait::async_trait;
    use sync_config_and_utils::TargetSettings;

    struct StaticTarget(TargetSystem);

    #[async_trait]
    impl SyncTarget for StaticTarget {
        fn system(&self) -> TargetSystem {
            self.0
        }

        async fn deliver(
            &self,
            _request: &DeliveryRequest,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            Ok(DeliveryReceipt {
                external_id: None,
                response: serde_json::Value::Null,
            })
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = TargetRegistry::new();
        assert!(registry.get(TargetSystem::Splynx).is_none());

        registry.register(Arc::new(StaticTarget(TargetSystem::Erpnext)));
        assert!(registry.get(TargetSystem::Erpnext).is_some());
        assert!(registry.get(TargetSystem::Splynx).is_none());
        assert_eq!(registry.systems(), vec![TargetSystem::Erpnext]);
    }

    #[test]
    fn from_config_builds_configured_targets() {
        let config = Config {
            splynx: Some(TargetSettings {
                base_url: "https://isp.example.com".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            }),
            ..Config::default()
        };

        let registry = TargetRegistry::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(registry.systems(), vec![TargetSystem::Splynx]);
    }

    #[test]
    fn from_config_rejects_bad_url() {
        let config = Config {
            erpnext: Some(TargetSettings {
                base_url: "not a url".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            }),
            ..Config::default()
        };

        assert!(TargetRegistry::from_config(&config, Duration::from_secs(5)).is_err());
    }
}
