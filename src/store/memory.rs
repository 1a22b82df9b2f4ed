//! In-process entity store
//!
//! Used in dev mode (no broker) and by tests. Entities keep their first
//! insertion position so query results come back in a stable order.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

use super::EntityStore;
use crate::entity::{Entity, EntityType, EqualityFilter};
use crate::types::Result;

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    entities: HashMap<String, Entity>,
}

impl Inner {
    fn put(&mut self, entity: Entity) {
        if !self.entities.contains_key(&entity.id) {
            self.order.push(entity.id.clone());
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Merge attributes into an existing entity, or insert it
    fn merge(&mut self, entity: &Entity) {
        match self.entities.get_mut(&entity.id) {
            Some(existing) => {
                for (name, value) in &entity.properties {
                    existing.properties.insert(name.clone(), value.clone());
                }
                if entity.observed_at.is_some() {
                    existing.observed_at = entity.observed_at;
                }
            }
            None => self.put(entity.clone()),
        }
    }
}

#[derive(Default)]
pub struct MemoryEntityStore {
    inner: RwLock<Inner>,
}

impl MemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store for dev mode
    pub fn memory_only() -> Self {
        warn!("Entity store running in memory-only mode (no context broker)");
        Self::new()
    }

    /// Seed the store, preserving the given order
    pub async fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write().await;
            for entity in entities {
                inner.put(entity);
            }
        }
        store
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every entity, in insertion order
    pub async fn snapshot(&self) -> Vec<Entity> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.entities.get(id).cloned())
            .collect()
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryEntityStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.inner.read().await.entities.get(id).cloned())
    }

    async fn query(&self, entity_type: EntityType, filter: Option<&EqualityFilter>) -> Result<Vec<Entity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.entities.get(id))
            .filter(|e| e.entity_type == entity_type)
            .filter(|e| filter.map(|f| f.matches(e)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn create(&self, entity: &Entity) -> Result<()> {
        self.inner.write().await.put(entity.clone());
        Ok(())
    }

    async fn upsert(&self, entity: &Entity) -> Result<()> {
        self.inner.write().await.merge(entity);
        Ok(())
    }

    async fn batch_upsert(&self, entities: &[Entity]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for entity in entities {
            inner.merge(entity);
        }
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PropertyValue;
    use serde_json::json;

    fn station(id: &str, locality: &str) -> Entity {
        Entity::new(id, EntityType::AirQualityObserved)
            .with_property("address", PropertyValue::property(json!({"addressLocality": locality})))
    }

    #[tokio::test]
    async fn test_query_keeps_insertion_order() {
        let store = MemoryEntityStore::with_entities([
            station("urn:ngsi-ld:AirQualityObserved:Hue:3", "Hue"),
            station("urn:ngsi-ld:AirQualityObserved:Hanoi:1", "Hanoi"),
            Entity::new("urn:ngsi-ld:Country:VN", EntityType::Country),
            station("urn:ngsi-ld:AirQualityObserved:Hanoi:2", "Hanoi"),
        ])
        .await;

        let all = store.query(EntityType::AirQualityObserved, None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "urn:ngsi-ld:AirQualityObserved:Hue:3",
                "urn:ngsi-ld:AirQualityObserved:Hanoi:1",
                "urn:ngsi-ld:AirQualityObserved:Hanoi:2",
            ]
        );

        let filter = EqualityFilter::parse("address.addressLocality==Hanoi").unwrap();
        let hanoi = store
            .query(EntityType::AirQualityObserved, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hanoi.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_merges() {
        let store = MemoryEntityStore::new();
        let entity = station("urn:ngsi-ld:AirQualityObserved:Hanoi:1", "Hanoi");

        store.upsert(&entity).await.unwrap();
        store.upsert(&entity).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.snapshot().await, vec![entity.clone()]);

        let patch = Entity::new(entity.id.clone(), EntityType::AirQualityObserved)
            .with_property("isMobile", PropertyValue::property(false));
        store.upsert(&patch).await.unwrap();

        let stored = store.get_by_id(&entity.id).await.unwrap().unwrap();
        assert!(stored.property("address").is_some());
        assert!(stored.property("isMobile").is_some());
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = MemoryEntityStore::new();
        store.batch_upsert(&[]).await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.get_by_id("urn:ngsi-ld:Country:VN").await.unwrap(), None);
    }
}
