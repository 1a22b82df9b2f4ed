//! HTTP client for an NGSI-LD context broker (Orion-LD and compatible)

use reqwest::{header, Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::EntityStore;
use crate::entity::{jsonld, Entity, EntityType, EqualityFilter, SMART_DATA_MODELS_CONTEXT};
use crate::types::{GatewayError, Result};

const LD_JSON: &str = "application/ld+json";

/// Broker page size for type queries. The gateway truncates afterwards.
const QUERY_PAGE_LIMIT: u32 = 1000;

fn context_link() -> String {
    format!(
        "<{}>; rel=\"http://www.w3.org/ns/json-ld#context\"; type=\"application/ld+json\"",
        SMART_DATA_MODELS_CONTEXT
    )
}

/// NGSI-LD broker client
///
/// ```rust,no_run
/// use ngsi_gateway::store::{ContextBrokerClient, EntityStore};
/// use ngsi_gateway::sources::http_client;
/// use std::time::Duration;
///
/// # async fn example() -> ngsi_gateway::types::Result<()> {
/// let client = http_client(Duration::from_secs(30))?;
/// let broker = ContextBrokerClient::new(client, "http://localhost:1026", true);
/// broker.health().await?;
/// # Ok(())
/// # }
/// ```
pub struct ContextBrokerClient {
    client: Client,
    base_url: String,
    batch: bool,
}

impl ContextBrokerClient {
    pub fn new(client: Client, base_url: &str, batch: bool) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            batch,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn entities_url(&self) -> String {
        format!("{}/ngsi-ld/v1/entities", self.base_url)
    }

    fn entity_url(&self, id: &str) -> String {
        format!("{}/{}", self.entities_url(), urlencoding::encode(id))
    }

    // ==================== Helper Methods ====================

    async fn check_status(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::from_upstream_status(
            status,
            format!("context broker: {}", body),
        ))
    }

    async fn read_json(response: Response) -> Result<Value> {
        response.json::<Value>().await.map_err(|e| {
            GatewayError::UpstreamUnavailable(format!("context broker returned invalid JSON: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl EntityStore for ContextBrokerClient {
    fn kind(&self) -> &'static str {
        "context-broker"
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Entity>> {
        let response = self
            .client
            .get(self.entity_url(id))
            .header(header::ACCEPT, LD_JSON)
            .header(header::LINK, context_link())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::read_json(Self::check_status(response).await?).await?;
        let entity = jsonld::decode(&body).map_err(|e| {
            GatewayError::UpstreamUnavailable(format!("context broker entity '{}' is unusable: {}", id, e))
        })?;
        Ok(Some(entity))
    }

    async fn query(&self, entity_type: EntityType, filter: Option<&EqualityFilter>) -> Result<Vec<Entity>> {
        let mut params = vec![
            ("type", entity_type.as_str().to_string()),
            ("limit", QUERY_PAGE_LIMIT.to_string()),
        ];
        if let Some(filter) = filter {
            params.push(("q", filter.to_query()));
        }

        let response = self
            .client
            .get(self.entities_url())
            .query(&params)
            .header(header::ACCEPT, LD_JSON)
            .header(header::LINK, context_link())
            .send()
            .await?;

        let body = Self::read_json(Self::check_status(response).await?).await?;
        let Value::Array(items) = body else {
            return Err(GatewayError::UpstreamUnavailable(
                "context broker query did not return an array".to_string(),
            ));
        };

        let mut entities = Vec::with_capacity(items.len());
        for item in &items {
            match jsonld::decode(item) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!(
                    entity_type = %entity_type,
                    error = %e,
                    "Skipping undecodable entity from context broker"
                ),
            }
        }

        debug!(entity_type = %entity_type, count = entities.len(), "Context broker query");
        Ok(entities)
    }

    async fn create(&self, entity: &Entity) -> Result<()> {
        let response = self
            .client
            .post(self.entities_url())
            .header(header::CONTENT_TYPE, LD_JSON)
            .json(&jsonld::encode(entity))
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn upsert(&self, entity: &Entity) -> Result<()> {
        let response = self
            .client
            .patch(format!("{}/attrs", self.entity_url(&entity.id)))
            .header(header::LINK, context_link())
            .json(&jsonld::encode_attributes(entity))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = %entity.id, "Entity not in context broker, creating");
            return self.create(entity).await;
        }

        Self::check_status(response).await?;
        Ok(())
    }

    async fn batch_upsert(&self, entities: &[Entity]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let body: Vec<Value> = entities.iter().map(jsonld::encode).collect();
        let response = self
            .client
            .post(format!("{}/ngsi-ld/v1/entityOperations/upsert", self.base_url))
            .header(header::CONTENT_TYPE, LD_JSON)
            .json(&body)
            .send()
            .await?;

        // 207 means some entities were rejected
        if response.status() == StatusCode::MULTI_STATUS {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::WriteBackFailed(format!(
                "context broker batch upsert partially failed: {}",
                detail
            )));
        }

        Self::check_status(response).await?;
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }

    async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/version", self.base_url))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
