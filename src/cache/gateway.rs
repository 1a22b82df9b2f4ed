//! Cache gateway - cache-aside orchestration
//!
//! ```text
//! request ──▶ CheckCache (EntityStore) ──fresh──▶ RespondCached
//!                 │ miss / stale / store error
//!                 ▼
//!            SourceAdapter fetch (coalesced per type + discriminator)
//!                 │
//!                 ▼
//!            WriteBack (best effort) ──▶ Truncate ──▶ RespondFresh
//! ```
//!
//! Store reads and writes never fail a request on their own: a failed cache
//! check is a miss and a failed write-back is logged and counted. Only an
//! unknown entity type or a failed upstream fetch is returned to the caller.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::coalesce::{Fetched, SingleFlight};
use super::freshness::FreshnessPolicy;
use super::keys::FetchKey;
use crate::entity::{discriminator_from_filter, Entity, EntityId, EntityType, EqualityFilter};
use crate::sources::{SourceAdapter, SourceRegistry};
use crate::store::EntityStore;
use crate::types::{GatewayError, Result};

/// A "query entities" request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    pub entity_type: EntityType,
    /// Raw `q=` expression
    pub filter: Option<String>,
    /// Positive result cap
    pub limit: Option<usize>,
}

impl EntityQuery {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            filter: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Timing configuration for the gateway
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    pub ttl: Duration,
    /// Deadline for each store and upstream call
    pub request_timeout: Duration,
    /// How long a coalesced request waits for the shared fetch
    pub coalesce_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ttl: super::freshness::DEFAULT_TTL,
            request_timeout: Duration::from_secs(30),
            coalesce_timeout: Duration::from_secs(60),
        }
    }
}

/// Gateway counters
#[derive(Debug, Default)]
pub struct GatewayStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    upstream_fetches: AtomicU64,
    coalesced_waits: AtomicU64,
    write_backs: AtomicU64,
    write_back_failures: AtomicU64,
}

/// Point-in-time copy of [`GatewayStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_fetches: u64,
    pub coalesced_waits: u64,
    pub write_backs: u64,
    pub write_back_failures: u64,
}

impl GatewayStats {
    pub fn snapshot(&self) -> GatewayStatsSnapshot {
        GatewayStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
            write_back_failures: self.write_back_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The cache-aside gateway
pub struct CacheGateway {
    store: Arc<dyn EntityStore>,
    sources: SourceRegistry,
    freshness: FreshnessPolicy,
    flights: Arc<SingleFlight>,
    request_timeout: Duration,
    stats: Arc<GatewayStats>,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn EntityStore>, sources: SourceRegistry, config: GatewayConfig) -> Self {
        info!(
            store = store.kind(),
            entity_types = ?sources.entity_types(),
            ttl_secs = config.ttl.as_secs(),
            "CacheGateway initialized"
        );

        Self {
            store,
            sources,
            freshness: FreshnessPolicy::new(config.ttl),
            flights: Arc::new(SingleFlight::new(config.coalesce_timeout)),
            request_timeout: config.request_timeout,
            stats: Arc::new(GatewayStats::default()),
        }
    }

    pub fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn stats(&self) -> GatewayStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn in_flight_fetches(&self) -> usize {
        self.flights.in_flight_count().await
    }

    // =========================================================================
    // Query path
    // =========================================================================

    /// Answer a type query from the cache when fresh, otherwise from upstream.
    pub async fn query(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        let entity_type = query.entity_type;
        let filter = query.filter.as_deref().and_then(EqualityFilter::parse);
        if query.filter.is_some() && filter.is_none() {
            debug!(filter = ?query.filter, "Ignoring filter that is not an equality expression");
        }

        if let Some(cached) = self.check_cache(entity_type, filter.as_ref()).await {
            if self.freshness.is_fresh_set(&cached) {
                GatewayStats::bump(&self.stats.cache_hits);
                debug!(entity_type = %entity_type, count = cached.len(), "Cache hit");
                return Ok(truncate(cached, query.limit));
            }
        }

        GatewayStats::bump(&self.stats.cache_misses);
        let discriminator = discriminator_from_filter(entity_type, query.filter.as_deref());
        debug!(entity_type = %entity_type, discriminator = %discriminator, "Cache miss");

        let fetched = self.fetch(entity_type, &discriminator).await?;
        Ok(truncate(fetched.entities, query.limit))
    }

    async fn check_cache(&self, entity_type: EntityType, filter: Option<&EqualityFilter>) -> Option<Vec<Entity>> {
        match self
            .with_deadline(self.store.query(entity_type, filter))
            .await
        {
            Ok(entities) => Some(entities),
            Err(e) => {
                warn!(
                    entity_type = %entity_type,
                    error = %e,
                    "Entity store query failed, treating as cache miss"
                );
                None
            }
        }
    }

    // =========================================================================
    // Get-by-id path
    // =========================================================================

    /// Return one entity, refetching its locality or country when the cached
    /// copy is missing or stale.
    ///
    /// The id is looked up in its canonical encoded form, so a decoded path
    /// id such as `urn:ngsi-ld:WeatherObserved:Ho Chi Minh City` finds the
    /// stored `Ho%20Chi%20Minh%20City` entity.
    pub async fn get(&self, id: &str) -> Result<Entity> {
        let requested = EntityId::parse(id).ok_or_else(|| GatewayError::malformed_identifier(id))?;
        let canonical = requested.to_urn();

        match self.with_deadline(self.store.get_by_id(&canonical)).await {
            Ok(Some(entity)) if self.freshness.is_fresh(&entity) => {
                GatewayStats::bump(&self.stats.cache_hits);
                debug!(id = %canonical, "Cache hit");
                return Ok(entity);
            }
            Ok(Some(_)) => debug!(id = %canonical, "Cached entity is stale"),
            Ok(None) => debug!(id = %canonical, "Entity not cached"),
            Err(e) => warn!(id = %canonical, error = %e, "Entity store read failed, treating as cache miss"),
        }
        GatewayStats::bump(&self.stats.cache_misses);

        let fetched = self
            .fetch(requested.entity_type, &requested.discriminator)
            .await?;

        fetched
            .entities
            .into_iter()
            .find(|entity| {
                entity.id == canonical
                    || EntityId::parse(&entity.id).is_some_and(|parsed| parsed.refers_to(&requested))
            })
            .ok_or_else(|| GatewayError::NotFound(format!("entity '{}' not found", id)))
    }

    // =========================================================================
    // Refresh (sync routes)
    // =========================================================================

    /// Fetch and write back regardless of cache state. Unlike the read paths,
    /// a failed write-back is returned.
    pub async fn refresh(&self, entity_type: EntityType, discriminator: &str) -> Result<Vec<Entity>> {
        let fetched = self.fetch(entity_type, discriminator).await?;
        match fetched.write_back_error {
            Some(e) => Err(e),
            None => Ok(fetched.entities),
        }
    }

    // =========================================================================
    // Upstream fetch + write-back
    // =========================================================================

    async fn fetch(&self, entity_type: EntityType, discriminator: &str) -> Result<Fetched> {
        let adapter = self.sources.get(entity_type)?;
        let discriminator = self.sources.resolve_discriminator(entity_type, discriminator);
        let key = FetchKey::new(entity_type, &discriminator);

        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let deadline = self.request_timeout;

        let flight = self
            .flights
            .run(key, move || {
                fetch_and_write_back(adapter, store, stats, deadline, entity_type, discriminator)
            })
            .await;

        if flight.coalesced {
            GatewayStats::bump(&self.stats.coalesced_waits);
        }
        flight.result
    }

    async fn with_deadline<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.request_timeout, call).await?
    }
}

/// The work of one flight: fetch from upstream, then write back.
async fn fetch_and_write_back(
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<dyn EntityStore>,
    stats: Arc<GatewayStats>,
    deadline: Duration,
    entity_type: EntityType,
    discriminator: String,
) -> Result<Fetched> {
    GatewayStats::bump(&stats.upstream_fetches);
    info!(
        entity_type = %entity_type,
        discriminator = %discriminator,
        source = adapter.name(),
        "Fetching from upstream"
    );

    let entities = tokio::time::timeout(deadline, adapter.fetch(&discriminator)).await??;
    let write_back_error = write_back(store.as_ref(), &entities, deadline, &stats)
        .await
        .err();

    Ok(Fetched {
        entities,
        write_back_error,
    })
}

/// Best-effort population of the entity store
///
/// Batch upsert when the store supports it, otherwise one upsert per
/// entity. Failures are logged with `event = "write_back_failed"` and
/// counted; the first one is returned for the sync routes.
async fn write_back(
    store: &dyn EntityStore,
    entities: &[Entity],
    deadline: Duration,
    stats: &GatewayStats,
) -> Result<()> {
    if entities.is_empty() {
        return Ok(());
    }

    let mut first_error = None;

    if store.supports_batch() {
        let outcome = match tokio::time::timeout(deadline, store.batch_upsert(entities)).await {
            Ok(result) => result,
            Err(elapsed) => Err(elapsed.into()),
        };
        match outcome {
            Ok(()) => {
                stats.write_backs.fetch_add(entities.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                GatewayStats::bump(&stats.write_back_failures);
                warn!(
                    event = "write_back_failed",
                    store = store.kind(),
                    count = entities.len(),
                    error = %e,
                    "Batch write-back failed"
                );
                first_error = Some(e);
            }
        }
    } else {
        for entity in entities {
            let outcome = match tokio::time::timeout(deadline, store.upsert(entity)).await {
                Ok(result) => result,
                Err(elapsed) => Err(elapsed.into()),
            };
            match outcome {
                Ok(()) => GatewayStats::bump(&stats.write_backs),
                Err(e) => {
                    GatewayStats::bump(&stats.write_back_failures);
                    warn!(
                        event = "write_back_failed",
                        store = store.kind(),
                        id = %entity.id,
                        error = %e,
                        "Write-back failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
    }

    match first_error {
        None => Ok(()),
        Some(GatewayError::WriteBackFailed(msg)) => Err(GatewayError::WriteBackFailed(msg)),
        Some(e) => Err(GatewayError::WriteBackFailed(e.to_string())),
    }
}

/// Keep the first `limit` entities, in store order
fn truncate(mut entities: Vec<Entity>, limit: Option<usize>) -> Vec<Entity> {
    if let Some(limit) = limit {
        entities.truncate(limit);
    }
    entities
}
