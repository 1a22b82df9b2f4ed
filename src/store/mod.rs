//! Entity store
//!
//! The authoritative cached copy of entities. The gateway only talks to the
//! [`EntityStore`] trait; [`ContextBrokerClient`] speaks NGSI-LD to a broker
//! and [`MemoryEntityStore`] keeps everything in process (dev mode, tests).

pub mod broker;
pub mod memory;

use crate::entity::{EntityType, EqualityFilter, Entity};
use crate::types::Result;

pub use broker::ContextBrokerClient;
pub use memory::MemoryEntityStore;

/// Trait for the entity store (allows in-memory fakes in tests)
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    /// Short backend name for logs and `/status`
    fn kind(&self) -> &'static str;

    /// Entity by id, `None` when the store has no such entity
    async fn get_by_id(&self, id: &str) -> Result<Option<Entity>>;

    /// Entities of a type, optionally narrowed by an equality filter,
    /// in the store's own order
    async fn query(&self, entity_type: EntityType, filter: Option<&EqualityFilter>) -> Result<Vec<Entity>>;

    async fn create(&self, entity: &Entity) -> Result<()>;

    /// Patch the entity's attributes, creating it when it does not exist
    async fn upsert(&self, entity: &Entity) -> Result<()>;

    /// Upsert many entities in one call. An empty slice is a no-op.
    async fn batch_upsert(&self, entities: &[Entity]) -> Result<()>;

    /// Whether `batch_upsert` is a single backend operation. When false the
    /// gateway upserts entities one at a time.
    fn supports_batch(&self) -> bool {
        true
    }

    /// Readiness probe
    async fn health(&self) -> Result<()>;
}
