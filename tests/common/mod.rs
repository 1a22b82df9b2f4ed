//! Shared fakes for the integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ngsi_gateway::cache::{CacheGateway, GatewayConfig};
use ngsi_gateway::entity::{Entity, EntityId, EntityType, EqualityFilter, PropertyValue};
use ngsi_gateway::sources::{SourceAdapter, SourceRegistry};
use ngsi_gateway::store::{EntityStore, MemoryEntityStore};
use ngsi_gateway::types::{GatewayError, Result};

pub const DEFAULT_LOCALITY: &str = "Ho Chi Minh City";
pub const DEFAULT_COUNTRY: &str = "VN";

// =============================================================================
// Entities
// =============================================================================

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::minutes(minutes)
}

pub fn weather(city: &str, observed: DateTime<Utc>, temperature: f64) -> Entity {
    Entity::from_id(&EntityId::weather(city))
        .with_property("temperature", PropertyValue::measured(temperature, "CEL"))
        .with_property(
            "address",
            PropertyValue::property(serde_json::json!({"addressLocality": city})),
        )
        .with_property("dateObserved", PropertyValue::property(observed.to_rfc3339()))
        .with_observed_at(observed)
}

pub fn country(code: &str, observed: DateTime<Utc>) -> Entity {
    Entity::from_id(&EntityId::country(code))
        .with_property("countryCode", PropertyValue::property(code))
        .with_property("dateObserved", PropertyValue::property(observed.to_rfc3339()))
        .with_observed_at(observed)
}

pub fn station(locality: &str, location_id: u64, observed: DateTime<Utc>) -> Entity {
    Entity::from_id(&EntityId::air_quality(locality, location_id))
        .with_property(
            "address",
            PropertyValue::property(serde_json::json!({"addressLocality": locality})),
        )
        .with_property("dateObserved", PropertyValue::property(observed.to_rfc3339()))
        .with_observed_at(observed)
}

// =============================================================================
// Source adapter fake
// =============================================================================

/// Adapter that hands back a canned entity set and records every call
pub struct CountingSource {
    entity_type: EntityType,
    entities: Vec<Entity>,
    delay: Duration,
    fail: Option<GatewayError>,
    calls: AtomicUsize,
    discriminators: Mutex<Vec<String>>,
}

impl CountingSource {
    pub fn new(entity_type: EntityType, entities: Vec<Entity>) -> Self {
        Self {
            entity_type,
            entities,
            delay: Duration::ZERO,
            fail: None,
            calls: AtomicUsize::new(0),
            discriminators: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, err: GatewayError) -> Self {
        self.fail = Some(err);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn discriminators(&self) -> Vec<String> {
        self.discriminators.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for CountingSource {
    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    fn name(&self) -> &'static str {
        "counting"
    }

    async fn fetch(&self, discriminator: &str) -> Result<Vec<Entity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.discriminators
            .lock()
            .unwrap()
            .push(discriminator.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.fail {
            Some(err) => Err(err.clone()),
            None => Ok(self.entities.clone()),
        }
    }
}

// =============================================================================
// Entity store fake
// =============================================================================

/// In-memory store whose reads and writes can be made to fail, with a
/// count of write calls.
pub struct FlakyStore {
    inner: MemoryEntityStore,
    fail_reads: bool,
    fail_writes: bool,
    batch: bool,
    pub batch_calls: AtomicUsize,
    pub upsert_calls: AtomicUsize,
}

impl FlakyStore {
    pub async fn new(entities: Vec<Entity>) -> Self {
        Self {
            inner: MemoryEntityStore::with_entities(entities).await,
            fail_reads: false,
            fail_writes: false,
            batch: true,
            batch_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn without_batch(mut self) -> Self {
        self.batch = false;
        self
    }

    pub fn writes(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst) + self.upsert_calls.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<Entity> {
        self.inner.snapshot().await
    }

    fn check(&self, fail: bool) -> Result<()> {
        if fail {
            Err(GatewayError::UpstreamUnavailable("store is down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl EntityStore for FlakyStore {
    fn kind(&self) -> &'static str {
        "flaky"
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Entity>> {
        self.check(self.fail_reads)?;
        self.inner.get_by_id(id).await
    }

    async fn query(&self, entity_type: EntityType, filter: Option<&EqualityFilter>) -> Result<Vec<Entity>> {
        self.check(self.fail_reads)?;
        self.inner.query(entity_type, filter).await
    }

    async fn create(&self, entity: &Entity) -> Result<()> {
        self.check(self.fail_writes)?;
        self.inner.create(entity).await
    }

    async fn upsert(&self, entity: &Entity) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check(self.fail_writes)?;
        self.inner.upsert(entity).await
    }

    async fn batch_upsert(&self, entities: &[Entity]) -> Result<()> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.check(self.fail_writes)?;
        self.inner.batch_upsert(entities).await
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }

    async fn health(&self) -> Result<()> {
        self.check(self.fail_reads)
    }
}

// =============================================================================
// Gateway wiring
// =============================================================================

pub fn config() -> GatewayConfig {
    GatewayConfig {
        ttl: Duration::from_secs(30 * 60),
        request_timeout: Duration::from_secs(2),
        coalesce_timeout: Duration::from_secs(5),
    }
}

/// Gateway over `store` with one adapter registered under the usual defaults
pub fn gateway_with(store: Arc<dyn EntityStore>, source: Arc<CountingSource>, config: GatewayConfig) -> CacheGateway {
    let default = match source.entity_type() {
        EntityType::Country => DEFAULT_COUNTRY,
        _ => DEFAULT_LOCALITY,
    };
    let sources = SourceRegistry::new().with(source, default);
    CacheGateway::new(store, sources, config)
}
