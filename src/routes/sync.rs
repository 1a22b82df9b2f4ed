//! Sync routes: force an upstream refresh and write-back
//!
//! - `POST /api/sync/air?locality=`
//! - `POST /api/sync/country?country=`
//! - `POST /api/sync/weather?city=`
//!
//! A missing parameter uses the configured default for the entity type.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::{error_response, json_response, parse_query};
use crate::cache::CacheGateway;
use crate::entity::EntityType;

/// What a sync route refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    Air,
    Country,
    Weather,
}

impl SyncTarget {
    /// Match `/api/sync/{target}`
    pub fn from_path(path: &str) -> Option<Self> {
        match path.strip_prefix("/api/sync/")?.trim_end_matches('/') {
            "air" => Some(Self::Air),
            "country" => Some(Self::Country),
            "weather" => Some(Self::Weather),
            _ => None,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Air => EntityType::AirQualityObserved,
            Self::Country => EntityType::Country,
            Self::Weather => EntityType::WeatherObserved,
        }
    }

    /// Query parameter carrying the discriminator
    pub fn parameter(&self) -> &'static str {
        match self {
            Self::Air => "locality",
            Self::Country => "country",
            Self::Weather => "city",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub message: String,
    pub entity_type: String,
    pub entities_count: usize,
    pub entity_ids: Vec<String>,
}

pub async fn handle_sync(gateway: &CacheGateway, target: SyncTarget, query: Option<&str>) -> Response<Full<Bytes>> {
    let params: HashMap<String, String> = match parse_query(query) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let entity_type = target.entity_type();
    let requested = params
        .get(target.parameter())
        .map(|v| v.trim().to_string())
        .unwrap_or_default();
    let discriminator = gateway.sources().resolve_discriminator(entity_type, &requested);

    match gateway.refresh(entity_type, &discriminator).await {
        Ok(entities) => {
            info!(
                entity_type = %entity_type,
                discriminator = %discriminator,
                count = entities.len(),
                "Sync complete"
            );
            json_response(
                StatusCode::OK,
                &SyncResponse {
                    message: format!(
                        "Synced {} {} entities for {}",
                        entities.len(),
                        entity_type,
                        discriminator
                    ),
                    entity_type: entity_type.to_string(),
                    entities_count: entities.len(),
                    entity_ids: entities.into_iter().map(|e| e.id).collect(),
                },
            )
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_target_from_path() {
        assert_eq!(SyncTarget::from_path("/api/sync/air"), Some(SyncTarget::Air));
        assert_eq!(SyncTarget::from_path("/api/sync/country/"), Some(SyncTarget::Country));
        assert_eq!(SyncTarget::from_path("/api/sync/weather"), Some(SyncTarget::Weather));
        assert_eq!(SyncTarget::from_path("/api/sync/tides"), None);
        assert_eq!(SyncTarget::from_path("/api/air"), None);

        assert_eq!(SyncTarget::Air.entity_type(), EntityType::AirQualityObserved);
        assert_eq!(SyncTarget::Weather.parameter(), "city");
    }
}
