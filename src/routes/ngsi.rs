//! NGSI-LD entity routes
//!
//! - `GET /ngsi-ld/v1/entities?type=&q=&limit=` (alias `/entities`)
//! - `GET /ngsi-ld/v1/entities/{id}` (alias `/entities/{id}`)

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{error_response, parse_query, respond, JSON_LD};
use crate::cache::{CacheGateway, EntityQuery};
use crate::entity::{Entity, EntityType};
use crate::types::{GatewayError, Result};

const PREFIXES: [&str; 2] = ["/ngsi-ld/v1/entities", "/entities"];

/// A matched entity path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRoute {
    Collection,
    /// Entity id, percent-decoded
    Item(String),
}

/// Match an entity collection or item path.
pub fn match_entity_route(path: &str) -> Option<EntityRoute> {
    for prefix in PREFIXES {
        let Some(remainder) = path.strip_prefix(prefix) else {
            continue;
        };
        if remainder.is_empty() || remainder == "/" {
            return Some(EntityRoute::Collection);
        }
        if let Some(raw_id) = remainder.strip_prefix('/') {
            let id = urlencoding::decode(raw_id)
                .map(|id| id.into_owned())
                .unwrap_or_else(|_| raw_id.to_string());
            return Some(EntityRoute::Item(id));
        }
    }
    None
}

#[derive(Debug, Default, Deserialize)]
struct QueryParams {
    #[serde(rename = "type")]
    entity_type: Option<String>,
    q: Option<String>,
    limit: Option<String>,
}

/// Build an [`EntityQuery`] from the request's query string.
pub fn parse_entity_query(query: Option<&str>) -> Result<EntityQuery> {
    let params: QueryParams = parse_query(query)?;

    let raw_type = params
        .entity_type
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest("missing required parameter 'type'".to_string()))?;
    let entity_type = EntityType::parse(raw_type.trim())
        .ok_or_else(|| GatewayError::UnknownEntityType(raw_type.clone()))?;

    let mut entity_query = EntityQuery::new(entity_type);
    if let Some(q) = params.q.filter(|q| !q.is_empty()) {
        entity_query = entity_query.with_filter(q);
    }
    if let Some(raw) = params.limit {
        let limit = raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| {
                GatewayError::BadRequest(format!("'limit' must be a positive integer, got '{}'", raw))
            })?;
        entity_query = entity_query.with_limit(limit);
    }

    Ok(entity_query)
}

pub async fn handle_query_entities(gateway: &CacheGateway, query: Option<&str>) -> Response<Full<Bytes>> {
    let entity_query = match parse_entity_query(query) {
        Ok(q) => q,
        Err(e) => return error_response(&e),
    };
    debug!(query = ?entity_query, "Entity query");

    match gateway.query(&entity_query).await {
        Ok(entities) => entities_response(&entities),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_get_entity(gateway: &CacheGateway, id: &str) -> Response<Full<Bytes>> {
    match gateway.get(id).await {
        Ok(entity) => match serde_json::to_string(&entity) {
            Ok(body) => respond(StatusCode::OK, JSON_LD, body),
            Err(e) => error_response(&GatewayError::from(e)),
        },
        Err(e) => error_response(&e),
    }
}

fn entities_response(entities: &[Entity]) -> Response<Full<Bytes>> {
    match serde_json::to_string(entities) {
        Ok(body) => respond(StatusCode::OK, JSON_LD, body),
        Err(e) => error_response(&GatewayError::from(e)),
    }
}
