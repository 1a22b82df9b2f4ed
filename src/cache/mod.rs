//! Cache-aside layer
//!
//! - `freshness`: TTL policy over observation timestamps
//! - `keys`: fetch keys (entity type + discriminator)
//! - `coalesce`: one upstream fetch per key at a time
//! - `gateway`: the request orchestrator

pub mod coalesce;
pub mod freshness;
pub mod gateway;
pub mod keys;

pub use coalesce::{Fetched, Flight, SingleFlight};
pub use freshness::FreshnessPolicy;
pub use gateway::{CacheGateway, EntityQuery, GatewayConfig, GatewayStats, GatewayStatsSnapshot};
pub use keys::FetchKey;
