//! ngsi-gateway - cache-aside NGSI-LD context gateway
//!
//! Serves air quality, country and weather entities from an NGSI-LD
//! context broker, refreshing them from OpenAQ and OpenWeather when the
//! cached observation is missing or older than the freshness TTL.
//!
//! ## Modules
//!
//! - **entity**: NGSI-LD entity model, JSON-LD codec, identifier scheme
//! - **codec**: Provider payloads to entities
//! - **sources**: Upstream adapters (OpenAQ, OpenWeather)
//! - **store**: Entity store (context broker, in-memory)
//! - **cache**: Freshness policy, request coalescing, the cache gateway
//! - **routes** / **server**: HTTP surface

pub mod cache;
pub mod codec;
pub mod config;
pub mod entity;
pub mod routes;
pub mod server;
pub mod sources;
pub mod store;
pub mod types;

pub use cache::{CacheGateway, EntityQuery, GatewayConfig};
pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
