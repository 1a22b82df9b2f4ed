//! Upstream source adapters
//!
//! One [`SourceAdapter`] per provider query. Each adapter owns its HTTP
//! client and credentials and hands back canonical entities; provider error
//! shapes never cross this boundary, only `UpstreamUnavailable`,
//! `UpstreamRejected` and `Config`.

pub mod openaq;
pub mod openweather;

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::entity::{Entity, EntityType};
use crate::types::{GatewayError, Result};

pub use openaq::{AirQualityLocationSource, CountrySource};
pub use openweather::WeatherCitySource;

/// Trait for fetching fresh entities from an upstream provider
/// (allows in-memory fakes in tests)
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Entity type this adapter produces
    fn entity_type(&self) -> EntityType;

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Fetch every entity for a locality or country code
    async fn fetch(&self, discriminator: &str) -> Result<Vec<Entity>>;
}

/// Adapters by entity type, plus the discriminator used when a request
/// does not carry one.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    adapters: HashMap<EntityType, Arc<dyn SourceAdapter>>,
    defaults: HashMap<EntityType, String>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its entity type, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>, default_discriminator: &str) {
        let entity_type = adapter.entity_type();
        self.adapters.insert(entity_type, adapter);
        self.defaults
            .insert(entity_type, default_discriminator.to_string());
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>, default_discriminator: &str) -> Self {
        self.register(adapter, default_discriminator);
        self
    }

    pub fn get(&self, entity_type: EntityType) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(&entity_type)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownEntityType(entity_type.to_string()))
    }

    pub fn default_discriminator(&self, entity_type: EntityType) -> &str {
        self.defaults
            .get(&entity_type)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// `discriminator`, or the configured default when it is blank.
    pub fn resolve_discriminator(&self, entity_type: EntityType, discriminator: &str) -> String {
        let trimmed = discriminator.trim();
        if trimmed.is_empty() {
            self.default_discriminator(entity_type).to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Served entity types, in a stable order
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.adapters.keys().copied().collect();
        types.sort();
        types
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("entity_types", &self.entity_types())
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// HTTP client shared by the adapters and the broker client
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ngsi-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Check the status and decode a provider response body.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    source: &str,
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::from_upstream_status(
            status,
            format!("{}: {}", source, body),
        ));
    }

    response.json::<T>().await.map_err(|e| {
        GatewayError::UpstreamUnavailable(format!("{}: invalid upstream payload: {}", source, e))
    })
}

fn require_key<'a>(source: &str, key: &'a Option<String>) -> Result<&'a str> {
    key.as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| GatewayError::Config(format!("{} API key is not configured", source)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(EntityType);

    #[async_trait::async_trait]
    impl SourceAdapter for Fixed {
        fn entity_type(&self) -> EntityType {
            self.0
        }

        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self, _discriminator: &str) -> Result<Vec<Entity>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_registry() {
        let registry = SourceRegistry::new()
            .with(Arc::new(Fixed(EntityType::Country)), "VN")
            .with(Arc::new(Fixed(EntityType::WeatherObserved)), "Ho Chi Minh City");

        assert!(registry.get(EntityType::Country).is_ok());
        assert!(matches!(
            registry.get(EntityType::AirQualityObserved),
            Err(GatewayError::UnknownEntityType(_))
        ));
        assert_eq!(registry.resolve_discriminator(EntityType::Country, "  "), "VN");
        assert_eq!(registry.resolve_discriminator(EntityType::Country, "TH"), "TH");
        assert_eq!(
            registry.entity_types(),
            vec![EntityType::Country, EntityType::WeatherObserved]
        );
    }

    #[test]
    fn test_require_key() {
        assert!(matches!(require_key("openaq", &None), Err(GatewayError::Config(_))));
        assert!(require_key("openaq", &Some(String::new())).is_err());
        assert_eq!(require_key("openaq", &Some("k".into())).unwrap(), "k");
    }
}
